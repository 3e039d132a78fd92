//! Table definitions for the three datasets.
//!
//! Dates are stored as ISO-8601 text, so range comparisons are plain
//! lexicographic ones. `mese_fatt`/`anno_fatt` are nullable billing-period
//! overrides; `mese_mov`/`anno_mov` are computed from the movement date at
//! import time and act as the fallback for rows without an override.

pub const SCHEMA: &str = r#"
-- Delivery invoice rows, one per article line
CREATE TABLE IF NOT EXISTS consegne (
    id INTEGER PRIMARY KEY,
    divisione TEXT,
    bu TEXT,
    deposito TEXT,
    data_mov TEXT,
    viaggio TEXT,
    ordine TEXT,
    consegna_num TEXT NOT NULL,
    cod_cliente TEXT,
    ragione_sociale TEXT,
    cod_articolo TEXT,
    descr_articolo TEXT,
    vettore TEXT,
    descr_vettore TEXT,
    tipologia TEXT,
    colli INTEGER,
    compenso REAL,
    mese_fatt INTEGER,
    anno_fatt INTEGER,
    mese_mov INTEGER,
    anno_mov INTEGER
);

CREATE INDEX IF NOT EXISTS idx_consegne_data_mov ON consegne(data_mov);
CREATE INDEX IF NOT EXISTS idx_consegne_consegna ON consegne(consegna_num);
CREATE INDEX IF NOT EXISTS idx_consegne_vettore ON consegne(vettore);

-- Third-party-carrier rows
CREATE TABLE IF NOT EXISTS terzisti (
    id INTEGER PRIMARY KEY,
    divisione TEXT,
    bu TEXT,
    deposito TEXT,
    data_mov TEXT,
    viaggio TEXT,
    consegna_num TEXT NOT NULL,
    cod_cliente TEXT,
    ragione_sociale TEXT,
    vettore TEXT NOT NULL,
    descr_vettore TEXT,
    tipologia TEXT,
    colli INTEGER,
    compenso REAL,
    tariffa REAL,
    mese_fatt INTEGER,
    anno_fatt INTEGER,
    mese_mov INTEGER,
    anno_mov INTEGER
);

CREATE INDEX IF NOT EXISTS idx_terzisti_data_mov ON terzisti(data_mov);
CREATE INDEX IF NOT EXISTS idx_terzisti_vettore ON terzisti(vettore);

-- Trip records, one per departed vehicle
CREATE TABLE IF NOT EXISTS viaggi (
    id INTEGER PRIMARY KEY,
    viaggio TEXT NOT NULL,
    data_inizio TEXT,
    deposito TEXT,
    nominativo TEXT,
    targa TEXT,
    tot_km REAL,
    colli INTEGER,
    peso_kg REAL,
    ordini INTEGER,
    mese INTEGER,
    anno INTEGER
);

CREATE INDEX IF NOT EXISTS idx_viaggi_data_inizio ON viaggi(data_inizio);
CREATE INDEX IF NOT EXISTS idx_viaggi_targa ON viaggi(targa);
"#;
