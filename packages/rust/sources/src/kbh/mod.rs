//! Read-only access to a Kleiner-Brauhelfer brewing log (SQLite via libSQL).
//!
//! The reader only pulls raw rows into [`LogRecord`]s; turning them into
//! canonical recipes and brews happens in [`project`].

pub mod project;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use libsql::{Connection, Database, Row, Value, params};
use tracing::{debug, info, warn};

use brewsync_shared::{BrewSyncError, NamePattern, Result};

use crate::CanonicalRecord;

/// `WeitereZutatenGaben.Typ` values that denote hops.
const HOP_ADDITION_KINDS: [i64; 2] = [100, -1];

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// One batch (`Sud`) of the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    /// Computed ABV, 0 when unknown.
    pub abv: f64,
    /// Liters pitched into the fermenter.
    pub pitch_volume: f64,
    /// Liters at the end of the boil.
    pub boil_end_volume: f64,
    /// Liters before straining the hops.
    pub pre_strain_volume: f64,
    /// Liters of young beer bottled or kegged.
    pub bottled_volume: f64,
    /// Boil minutes after the bittering addition.
    pub boil_time: f64,
    /// Original extract at pitching, °P.
    pub og_plato: f64,
    pub created: String,
    pub saved: String,
    pub notes: String,
    /// Brewhouse yield in percent.
    pub brewhouse_yield: f64,
    pub ibu: f64,
    pub color_ebc: f64,
    pub yeast_units: f64,
    pub yeast_name: String,
    pub brew_date: String,
    pub pitch_date: String,
    pub bottling_date: String,
    pub brewed: bool,
    pub bottled: bool,
    /// Target carbonation, g/l.
    pub co2: f64,
    pub carbonation_temperature: f64,
    pub maturation_weeks: f64,
    pub mash_in_temperature: f64,
    pub mash_water: f64,
    pub sparge_water: f64,
    pub equipment_name: String,
}

/// A brewing system profile (`Brauanlagen`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Equipment {
    pub name: String,
    /// Liters evaporated per hour of boil.
    pub evaporation_rate: f64,
    pub notes: String,
}

/// One main-fermentation extract reading (`Hauptgaerverlauf`).
#[derive(Debug, Clone, PartialEq)]
pub struct FermentationReading {
    pub timestamp: String,
    pub plato: f64,
}

/// One grain bill entry (`Malzschuettung`).
#[derive(Debug, Clone, PartialEq)]
pub struct Malt {
    pub name: String,
    pub percent: f64,
    pub ebc: f64,
    pub kg: f64,
}

/// Any other addition (`WeitereZutatenGaben`).
#[derive(Debug, Clone, PartialEq)]
pub struct Addition {
    pub name: String,
    pub kind: i64,
    /// Extract yield in percent; positive for fermentables.
    pub yield_percent: f64,
    pub ebc: f64,
    /// 0 fermenter, 1 boil, 2 mash.
    pub stage: i64,
    /// Minutes the addition stays in.
    pub duration: f64,
    pub grams: f64,
}

impl Addition {
    pub fn is_hop(&self) -> bool {
        HOP_ADDITION_KINDS.contains(&self.kind)
    }

    pub fn is_fermentable(&self) -> bool {
        !self.is_hop() && self.yield_percent > 0.0
    }
}

/// A kettle hop addition (`HopfenGaben`).
#[derive(Debug, Clone, PartialEq)]
pub struct HopAddition {
    pub name: String,
    pub alpha: f64,
    pub pellets: bool,
    pub first_wort: bool,
    pub minutes: f64,
    pub grams: f64,
}

/// A hop inventory entry (`Hopfen`).
#[derive(Debug, Clone, PartialEq)]
pub struct HopStock {
    pub alpha: f64,
    pub pellets: bool,
}

/// A yeast inventory entry (`Hefe`).
#[derive(Debug, Clone, PartialEq)]
pub struct YeastStock {
    /// Free text starting with the attenuation percentage, e.g. `"80-84%"`.
    pub attenuation: String,
    pub dry: bool,
    /// Package size, e.g. `"11,5 g"`.
    pub package: String,
}

/// One mash rest (`Rasten`).
#[derive(Debug, Clone, PartialEq)]
pub struct Rest {
    pub name: String,
    pub temperature: f64,
    pub minutes: f64,
}

/// Everything the log knows about one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    pub batch: Batch,
    pub equipment: Option<Equipment>,
    pub readings: Vec<FermentationReading>,
    pub malts: Vec<Malt>,
    /// Ordered by amount, largest first.
    pub additions: Vec<Addition>,
    /// First-wort additions first (largest first), then by time, longest first.
    pub hops: Vec<HopAddition>,
    /// Inventory entries for the dry-hop additions, by name.
    pub hop_stock: HashMap<String, HopStock>,
    pub yeast: Option<YeastStock>,
    pub rests: Vec<Rest>,
}

// ---------------------------------------------------------------------------
// Column access
// ---------------------------------------------------------------------------

fn source_err(e: libsql::Error) -> BrewSyncError {
    BrewSyncError::Source(e.to_string())
}

fn real(row: &Row, idx: i32) -> Result<f64> {
    Ok(match row.get_value(idx).map_err(source_err)? {
        Value::Integer(i) => i as f64,
        Value::Real(f) => f,
        Value::Text(s) => number_text(&s.replace(',', "."), idx),
        Value::Null | Value::Blob(_) => 0.0,
    })
}

fn int(row: &Row, idx: i32) -> Result<i64> {
    Ok(match row.get_value(idx).map_err(source_err)? {
        Value::Integer(i) => i,
        Value::Real(f) => f as i64,
        Value::Text(s) => number_text(&s, idx),
        Value::Null | Value::Blob(_) => 0,
    })
}

/// A number stored as text. Empty text is zero; anything unreadable is logged and zero.
fn number_text<T: FromStr + Default>(s: &str, idx: i32) -> T {
    let s = s.trim();
    if s.is_empty() {
        return T::default();
    }
    s.parse().unwrap_or_else(|_| {
        warn!(column = idx, value = s, "unreadable number in brewing log, using 0");
        T::default()
    })
}

fn text(row: &Row, idx: i32) -> Result<String> {
    Ok(match row.get_value(idx).map_err(source_err)? {
        Value::Text(s) => s,
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    })
}

// ---------------------------------------------------------------------------
// Database handle
// ---------------------------------------------------------------------------

const BATCH_COLUMNS: &str = "ID, Sudname, erg_Alkohol, WuerzemengeAnstellen, WuerzemengeKochende, \
     WuerzemengeVorHopfenseihen, JungbiermengeAbfuellen, KochdauerNachBitterhopfung, SWAnstellen, \
     Erstellt, Gespeichert, Kommentar, erg_Sudhausausbeute, IBU, erg_Farbe, HefeAnzahlEinheiten, \
     AuswahlHefe, Braudatum, Anstelldatum, Abfuelldatum, BierWurdeGebraut, BierWurdeAbgefuellt, \
     CO2, TemperaturKarbonisierung, Reifezeit, EinmaischenTemp, erg_WHauptguss, erg_WNachguss, \
     AuswahlBrauanlageName";

fn batch_from_row(row: &Row) -> Result<Batch> {
    Ok(Batch {
        id: int(row, 0)?,
        name: text(row, 1)?,
        abv: real(row, 2)?,
        pitch_volume: real(row, 3)?,
        boil_end_volume: real(row, 4)?,
        pre_strain_volume: real(row, 5)?,
        bottled_volume: real(row, 6)?,
        boil_time: real(row, 7)?,
        og_plato: real(row, 8)?,
        created: text(row, 9)?,
        saved: text(row, 10)?,
        notes: text(row, 11)?,
        brewhouse_yield: real(row, 12)?,
        ibu: real(row, 13)?,
        color_ebc: real(row, 14)?,
        yeast_units: real(row, 15)?,
        yeast_name: text(row, 16)?,
        brew_date: text(row, 17)?,
        pitch_date: text(row, 18)?,
        bottling_date: text(row, 19)?,
        brewed: int(row, 20)? != 0,
        bottled: int(row, 21)? != 0,
        co2: real(row, 22)?,
        carbonation_temperature: real(row, 23)?,
        maturation_weeks: real(row, 24)?,
        mash_in_temperature: real(row, 25)?,
        mash_water: real(row, 26)?,
        sparge_water: real(row, 27)?,
        equipment_name: text(row, 28)?,
    })
}

/// Handle on a brewing log database, opened for reading only.
pub struct KbhDatabase {
    path: PathBuf,
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl KbhDatabase {
    /// Open the log at `path`. A missing file is a [`BrewSyncError::MissingSource`].
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BrewSyncError::MissingSource(format!(
                "brewing log {} does not exist",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(source_err)?;
        let conn = db.connect().map_err(source_err)?;

        debug!(path = %path.display(), "opened brewing log");
        Ok(Self {
            path: path.to_path_buf(),
            db,
            conn,
        })
    }

    /// Re-open the file to pick up changes written by another program.
    pub async fn reopen(&mut self) -> Result<()> {
        let fresh = Self::open(&self.path).await?;
        *self = fresh;
        info!(path = %self.path.display(), "reopened brewing log");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw records of all batches whose name matches `pattern`.
    pub async fn records(&self, pattern: &NamePattern) -> Result<Vec<LogRecord>> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM Sud WHERE Sudname LIKE ?1 ORDER BY Sudname");
        let mut rows = self
            .conn
            .query(&sql, params![pattern.to_sql_like()])
            .await
            .map_err(source_err)?;

        let mut batches = Vec::new();
        while let Some(row) = rows.next().await.map_err(source_err)? {
            let batch = batch_from_row(&row)?;
            // LIKE is case-insensitive; names are not.
            if pattern.matches(&batch.name) {
                batches.push(batch);
            }
        }

        let mut records = Vec::with_capacity(batches.len());
        for batch in batches {
            records.push(self.load_record(batch).await?);
        }
        debug!(pattern = pattern.as_str(), count = records.len(), "read batches");
        Ok(records)
    }

    /// The single raw record matching `pattern`.
    pub async fn record(&self, pattern: &NamePattern) -> Result<LogRecord> {
        let mut records = self.records(pattern).await?;
        if records.len() != 1 {
            warn!(pattern = pattern.as_str(), count = records.len(), "pattern did not select a unique batch");
            return Err(BrewSyncError::AmbiguousMatch {
                pattern: pattern.as_str().to_string(),
                count: records.len(),
            });
        }
        Ok(records.remove(0))
    }

    /// Canonical recipes (and brews) of all matching batches.
    pub async fn recipes(&self, pattern: &NamePattern) -> Result<Vec<CanonicalRecord>> {
        Ok(self
            .records(pattern)
            .await?
            .iter()
            .map(project::canonical)
            .collect())
    }

    /// Canonical recipe of the single matching batch.
    pub async fn recipe(&self, pattern: &NamePattern) -> Result<CanonicalRecord> {
        Ok(project::canonical(&self.record(pattern).await?))
    }

    // -----------------------------------------------------------------------
    // Per-batch tables
    // -----------------------------------------------------------------------

    async fn load_record(&self, batch: Batch) -> Result<LogRecord> {
        let id = batch.id;
        let equipment = self.equipment(&batch.equipment_name).await?;
        let readings = self.readings(id).await?;
        let malts = self.malts(id).await?;
        let additions = self.additions(id).await?;
        let hops = self.hops(id).await?;

        let mut hop_stock = HashMap::new();
        for addition in additions.iter().filter(|a| a.is_hop() && a.stage == 0) {
            if let Some(stock) = self.hop_stock(&addition.name).await? {
                hop_stock.insert(addition.name.clone(), stock);
            }
        }
        let yeast = self.yeast_stock(&batch.yeast_name).await?;
        let rests = self.rests(id).await?;

        Ok(LogRecord {
            batch,
            equipment,
            readings,
            malts,
            additions,
            hops,
            hop_stock,
            yeast,
            rests,
        })
    }

    async fn equipment(&self, name: &str) -> Result<Option<Equipment>> {
        if name.is_empty() {
            return Ok(None);
        }
        let mut rows = self
            .conn
            .query(
                "SELECT Braulage, Verdampfungsrate, Bemerkung FROM Brauanlagen WHERE Braulage = ?1",
                params![name],
            )
            .await
            .map_err(source_err)?;
        match rows.next().await.map_err(source_err)? {
            Some(row) => Ok(Some(Equipment {
                name: text(&row, 0)?,
                evaporation_rate: real(&row, 1)?,
                notes: text(&row, 2)?,
            })),
            None => Ok(None),
        }
    }

    async fn readings(&self, id: i64) -> Result<Vec<FermentationReading>> {
        let mut rows = self
            .conn
            .query(
                "SELECT Zeitstempel, SW FROM Hauptgaerverlauf WHERE SudID = ?1 ORDER BY Zeitstempel",
                params![id],
            )
            .await
            .map_err(source_err)?;
        let mut readings = Vec::new();
        while let Some(row) = rows.next().await.map_err(source_err)? {
            readings.push(FermentationReading {
                timestamp: text(&row, 0)?,
                plato: real(&row, 1)?,
            });
        }
        Ok(readings)
    }

    async fn malts(&self, id: i64) -> Result<Vec<Malt>> {
        let mut rows = self
            .conn
            .query(
                "SELECT Name, Prozent, Farbe, erg_Menge FROM Malzschuettung \
                 WHERE SudID = ?1 ORDER BY Prozent DESC",
                params![id],
            )
            .await
            .map_err(source_err)?;
        let mut malts = Vec::new();
        while let Some(row) = rows.next().await.map_err(source_err)? {
            malts.push(Malt {
                name: text(&row, 0)?,
                percent: real(&row, 1)?,
                ebc: real(&row, 2)?,
                kg: real(&row, 3)?,
            });
        }
        Ok(malts)
    }

    async fn additions(&self, id: i64) -> Result<Vec<Addition>> {
        let mut rows = self
            .conn
            .query(
                "SELECT Name, Typ, Ausbeute, Farbe, Zeitpunkt, Zugabedauer, erg_Menge \
                 FROM WeitereZutatenGaben WHERE SudID = ?1 ORDER BY erg_Menge DESC",
                params![id],
            )
            .await
            .map_err(source_err)?;
        let mut additions = Vec::new();
        while let Some(row) = rows.next().await.map_err(source_err)? {
            additions.push(Addition {
                name: text(&row, 0)?,
                kind: int(&row, 1)?,
                yield_percent: real(&row, 2)?,
                ebc: real(&row, 3)?,
                stage: int(&row, 4)?,
                duration: real(&row, 5)?,
                grams: real(&row, 6)?,
            });
        }
        Ok(additions)
    }

    async fn hops(&self, id: i64) -> Result<Vec<HopAddition>> {
        let mut rows = self
            .conn
            .query(
                "SELECT Name, Alpha, Pellets, Vorderwuerze, Zeit, erg_Menge FROM HopfenGaben \
                 WHERE SudID = ?1 \
                 ORDER BY Vorderwuerze DESC, \
                 CASE WHEN Vorderwuerze = 1 THEN erg_Menge ELSE Zeit END DESC",
                params![id],
            )
            .await
            .map_err(source_err)?;
        let mut hops = Vec::new();
        while let Some(row) = rows.next().await.map_err(source_err)? {
            hops.push(HopAddition {
                name: text(&row, 0)?,
                alpha: real(&row, 1)?,
                pellets: int(&row, 2)? == 1,
                first_wort: int(&row, 3)? == 1,
                minutes: real(&row, 4)?,
                grams: real(&row, 5)?,
            });
        }
        Ok(hops)
    }

    async fn hop_stock(&self, name: &str) -> Result<Option<HopStock>> {
        let mut rows = self
            .conn
            .query(
                "SELECT Alpha, Pellets FROM Hopfen WHERE Beschreibung = ?1",
                params![name],
            )
            .await
            .map_err(source_err)?;
        match rows.next().await.map_err(source_err)? {
            Some(row) => Ok(Some(HopStock {
                alpha: real(&row, 0)?,
                pellets: int(&row, 1)? == 1,
            })),
            None => Ok(None),
        }
    }

    async fn yeast_stock(&self, name: &str) -> Result<Option<YeastStock>> {
        if name.is_empty() {
            return Ok(None);
        }
        let mut rows = self
            .conn
            .query(
                "SELECT EVG, TypTrFl, Verpackungsmenge FROM Hefe WHERE Beschreibung = ?1",
                params![name],
            )
            .await
            .map_err(source_err)?;
        match rows.next().await.map_err(source_err)? {
            Some(row) => Ok(Some(YeastStock {
                attenuation: text(&row, 0)?,
                dry: int(&row, 1)? == 1,
                package: text(&row, 2)?,
            })),
            None => Ok(None),
        }
    }

    async fn rests(&self, id: i64) -> Result<Vec<Rest>> {
        let mut rows = self
            .conn
            .query(
                "SELECT RastName, RastTemp, RastDauer FROM Rasten WHERE SudID = ?1 ORDER BY rowid",
                params![id],
            )
            .await
            .map_err(source_err)?;
        let mut rests = Vec::new();
        while let Some(row) = rows.next().await.map_err(source_err)? {
            rests.push(Rest {
                name: text(&row, 0)?,
                temperature: real(&row, 1)?,
                minutes: real(&row, 2)?,
            });
        }
        Ok(rests)
    }
}
