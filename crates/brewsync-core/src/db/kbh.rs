//! Read-only access to a Kleiner-Brauhelfer database.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::models::{
    Addition, AdditionStage, FermentationStep, HopAddition, HopVariety, LocalRecipe, Malt,
    MashRest, Milli, YeastPitch,
};

/// Name of the intrinsic step derived from the fermentation log.
pub const MAIN_FERMENTATION: &str = "Hauptgärung";

/// `WeitereZutatenGaben.Typ` codes of hop additions.
const HOP_ADDITION_TYPES: [i64; 2] = [100, -1];

/// Source of local recipes.
pub trait RecipeRepository: Send + Sync {
    /// Every recipe with its nested rows, ordered by local id.
    fn fetch_all_recipes(&self) -> Result<Vec<LocalRecipe>>;
}

/// A KBH `SQLite` file, opened read-only on every fetch so that edits made
/// in the brewing application are picked up.
#[derive(Debug, Clone)]
pub struct KbhRepository {
    path: PathBuf,
}

impl KbhRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection> {
        if !self.path.exists() {
            return Err(Error::NotFound(format!(
                "database {}",
                self.path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!("Opened {} read-only", self.path.display());
        Ok(conn)
    }
}

impl RecipeRepository for KbhRepository {
    fn fetch_all_recipes(&self) -> Result<Vec<LocalRecipe>> {
        let conn = self.open()?;
        let recipes = SudReader::new(&conn).read_all()?;
        tracing::info!(
            "Read {} recipes from {}",
            recipes.len(),
            self.path.display()
        );
        Ok(recipes)
    }
}

struct SudReader<'a> {
    conn: &'a Connection,
}

impl<'a> SudReader<'a> {
    const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn read_all(&self) -> Result<Vec<LocalRecipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT ID, Sudname, Kommentar, Erstellt, Gespeichert, WuerzemengeAnstellen,
                    WuerzemengeKochende, WuerzemengeVorHopfenseihen, JungbiermengeAbfuellen,
                    KochdauerNachBitterhopfung, SWAnstellen, erg_Alkohol, erg_Sudhausausbeute,
                    IBU, erg_Farbe, AuswahlHefe, HefeAnzahlEinheiten
             FROM Sud ORDER BY ID",
        )?;
        let suds = stmt
            .query_map([], Self::parse_sud)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        suds.into_iter().map(|sud| self.complete(sud)).collect()
    }

    fn parse_sud(row: &Row<'_>) -> rusqlite::Result<Sud> {
        let created_at = timestamp(row.get(3)?);
        Ok(Sud {
            recipe: LocalRecipe {
                id: row.get(0)?,
                name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                comment: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                created_at: created_at.unwrap_or_default(),
                modified_at: timestamp(row.get(4)?).or(created_at).unwrap_or_default(),
                batch_volume: real(row, 5)?,
                boil_volume: real(row, 6)?,
                pre_strain_volume: real(row, 7)?,
                bottled_volume: real(row, 8)?,
                boil_minutes: real(row, 9)?.round_int(),
                original_plato: real(row, 10)?,
                final_plato: None,
                abv: real(row, 11)?,
                efficiency_percent: real(row, 12)?,
                ibu: real(row, 13)?,
                color_ebc: real(row, 14)?,
                malts: Vec::new(),
                hops: Vec::new(),
                additions: Vec::new(),
                yeast: None,
                mash_steps: Vec::new(),
                fermentation_steps: Vec::new(),
            },
            yeast_name: row.get(15)?,
            yeast_units: real(row, 16)?,
        })
    }

    fn complete(&self, sud: Sud) -> Result<LocalRecipe> {
        let Sud {
            mut recipe,
            yeast_name,
            yeast_units,
        } = sud;
        let id = recipe.id;

        recipe.malts = self.malts(id)?;
        recipe.hops = self.hops(id)?;
        recipe.additions = self.additions(id)?;
        recipe.yeast = match yeast_name {
            Some(name) if yeast_units.is_positive() => Some(self.yeast(name, yeast_units)?),
            _ => None,
        };
        recipe.mash_steps = self.mash_rests(id)?;

        let readings = self.readings(id)?;
        recipe.final_plato = readings.last().map(|reading| reading.plato);
        recipe.fermentation_steps = main_fermentation(&readings).into_iter().collect();

        Ok(recipe)
    }

    fn malts(&self, id: i64) -> Result<Vec<Malt>> {
        let mut stmt = self.conn.prepare(
            "SELECT Name, Prozent, Farbe, erg_Menge FROM Malzschuettung
             WHERE SudID = ? ORDER BY Prozent DESC",
        )?;
        let malts = stmt
            .query_map(params![id], |row| {
                Ok(Malt {
                    name: text(row, 0)?,
                    share_percent: real(row, 1)?,
                    color_ebc: real(row, 2)?,
                    amount_kg: real(row, 3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(malts)
    }

    fn hops(&self, id: i64) -> Result<Vec<HopAddition>> {
        let mut stmt = self.conn.prepare(
            "SELECT Name, Alpha, Pellets, erg_Menge, Zeit, Vorderwuerze FROM HopfenGaben
             WHERE SudID = ? ORDER BY Zeit DESC",
        )?;
        let hops = stmt
            .query_map(params![id], |row| {
                Ok(HopAddition {
                    name: text(row, 0)?,
                    alpha: real(row, 1)?,
                    pellets: flag(row, 2)?,
                    amount_g: real(row, 3)?,
                    minutes: real(row, 4)?.round_int(),
                    first_wort: flag(row, 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hops)
    }

    fn additions(&self, id: i64) -> Result<Vec<Addition>> {
        let mut stmt = self.conn.prepare(
            "SELECT Name, Typ, Ausbeute, Farbe, erg_Menge, Zeitpunkt, Zugabedauer
             FROM WeitereZutatenGaben WHERE SudID = ? ORDER BY erg_Menge DESC",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((
                    Addition {
                        name: text(row, 0)?,
                        is_hop: HOP_ADDITION_TYPES.contains(&real(row, 1)?.round_int()),
                        yield_percent: real(row, 2)?,
                        color_ebc: real(row, 3)?,
                        amount_g: real(row, 4)?,
                        stage: AdditionStage::Fermentation,
                        duration_minutes: real(row, 6)?.round_int(),
                        hop: None,
                    },
                    real(row, 5)?.round_int(),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut additions = Vec::with_capacity(rows.len());
        for (mut addition, code) in rows {
            let Some(stage) = AdditionStage::from_code(code) else {
                tracing::warn!(
                    "Skipping addition '{}' of recipe {} with unknown stage {}",
                    addition.name,
                    id,
                    code
                );
                continue;
            };
            addition.stage = stage;
            if addition.is_hop {
                addition.hop = self.hop_variety(&addition.name)?;
            }
            additions.push(addition);
        }
        Ok(additions)
    }

    fn hop_variety(&self, name: &str) -> Result<Option<HopVariety>> {
        let variety = self
            .conn
            .query_row(
                "SELECT Alpha, Pellets FROM Hopfen WHERE Beschreibung = ?",
                params![name],
                |row| {
                    Ok(HopVariety {
                        alpha: real(row, 0)?,
                        pellets: flag(row, 1)?,
                    })
                },
            )
            .optional()?;
        Ok(variety)
    }

    fn yeast(&self, name: String, units: Milli) -> Result<YeastPitch> {
        let inventory = self
            .conn
            .query_row(
                "SELECT EVG, TypTrFl, Verpackungsmenge FROM Hefe WHERE Beschreibung = ?",
                params![name],
                |row| {
                    Ok((
                        leading_integer(row.get_ref(0)?),
                        real(row, 1)?.round_int() == 1,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let (attenuation_percent, dry, package) = inventory.unwrap_or((None, true, None));
        Ok(YeastPitch {
            name,
            units,
            attenuation_percent,
            dry,
            package,
        })
    }

    fn mash_rests(&self, id: i64) -> Result<Vec<MashRest>> {
        let mut stmt = self
            .conn
            .prepare("SELECT RastName, RastTemp, RastDauer FROM Rasten WHERE SudID = ?")?;
        let rests = stmt
            .query_map(params![id], |row| {
                Ok(MashRest {
                    name: text(row, 0)?,
                    temperature: real(row, 1)?,
                    minutes: real(row, 2)?.round_int(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rests)
    }

    fn readings(&self, id: i64) -> Result<Vec<Reading>> {
        let mut stmt = self.conn.prepare(
            "SELECT Zeitstempel, SW, Temp FROM Hauptgaerverlauf
             WHERE SudID = ? ORDER BY Zeitstempel",
        )?;
        let readings = stmt
            .query_map(params![id], |row| {
                Ok(Reading {
                    at: timestamp(row.get(0)?),
                    plato: real(row, 1)?,
                    temperature: real(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(readings)
    }
}

struct Sud {
    recipe: LocalRecipe,
    yeast_name: Option<String>,
    yeast_units: Milli,
}

struct Reading {
    at: Option<NaiveDateTime>,
    plato: Milli,
    temperature: Milli,
}

/// First to last reading in whole days (at least one) at the mean
/// temperature.
fn main_fermentation(readings: &[Reading]) -> Option<FermentationStep> {
    let temperatures: Vec<Milli> = readings.iter().map(|reading| reading.temperature).collect();
    let temperature = Milli::mean(&temperatures)?;

    let stamps: Vec<NaiveDateTime> = readings.iter().filter_map(|reading| reading.at).collect();
    let days = match (stamps.first(), stamps.last()) {
        (Some(first), Some(last)) => (*last - *first).num_days().max(1),
        _ => 1,
    };
    let days = u32::try_from(days).unwrap_or(u32::MAX);

    Some(FermentationStep::new(MAIN_FERMENTATION, days, temperature.round_to(1)))
}

fn real(row: &Row<'_>, index: usize) -> rusqlite::Result<Milli> {
    Ok(row
        .get::<_, Option<f64>>(index)?
        .map_or(Milli::ZERO, Milli::from_f64))
}

fn text(row: &Row<'_>, index: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(index)?.unwrap_or_default())
}

fn flag(row: &Row<'_>, index: usize) -> rusqlite::Result<bool> {
    Ok(real(row, index)? != Milli::ZERO)
}

/// Leading digits of values such as `80-84 %`.
fn leading_integer(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Integer(number) => Some(number),
        ValueRef::Real(number) => Some(Milli::from_f64(number).round_int()),
        ValueRef::Text(bytes) => {
            let raw = String::from_utf8_lossy(bytes);
            let digits: String = raw
                .trim()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        }
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

fn timestamp(raw: Option<String>) -> Option<NaiveDateTime> {
    let raw = raw?;
    let prefix = raw.trim().get(..19)?;
    NaiveDateTime::parse_from_str(prefix, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(prefix, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
