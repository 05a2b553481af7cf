//! Local recipe to remote document translation.
//!
//! Pure and deterministic: the same [`LocalRecipe`] always yields the same
//! document bytes. Volumes and temperatures are copied as exact decimals;
//! nonlinear values are computed in floating point and quantised once.

use std::cmp::Reverse;

use crate::models::{
    Addition, AdditionStage, Adjunct, AdjunctUsage, Fermentable, FermentableUsage,
    FermentationEntry, FermentationStep, Hop, HopForm, HopUsage, LocalRecipe, MashEntry, Milli,
    RecipeDocument, Yeast, YeastPitch, DEFAULT_SOURCE, RECIPE_TYPE_ALL_GRAIN, UNIT_TYPE_METRIC,
    YEAST_UNITS,
};
use crate::tags::{parse_comment, ParseError, ParsedComment};

/// Assumed extract potential of malts, in points per pound per gallon.
const MALT_PPG: i64 = 35;
const MINUTES_PER_DAY: i64 = 1440;
const DEFAULT_FERMENTATION_NAME: &str = "Hauptgärung";
const DEFAULT_FERMENTATION_DAYS: u32 = 10;
const DEFAULT_FERMENTATION_TEMPERATURE: i64 = 18;

/// Parse the comment tags of `recipe` and translate it.
pub fn translate_recipe(recipe: &LocalRecipe) -> Result<RecipeDocument, ParseError> {
    let comment = parse_comment(&recipe.comment)?;
    Ok(translate(recipe, &comment))
}

/// Translate a recipe whose comment has already been parsed.
pub fn translate(recipe: &LocalRecipe, comment: &ParsedComment) -> RecipeDocument {
    let og = plato_to_gravity(recipe.original_plato);
    let fg = plato_to_gravity(recipe.final_plato.unwrap_or(Milli::ZERO));

    RecipeDocument {
        name: recipe.name.clone(),
        description: first_line(&comment.residual),
        notes: comment.residual.clone(),
        batch_size: recipe.batch_volume,
        boil_size: recipe.boil_volume,
        boil_time: recipe.boil_minutes,
        og,
        fg,
        abv: recipe.abv.is_positive().then_some(recipe.abv),
        calories: calories(
            recipe.original_plato,
            recipe.final_plato.unwrap_or(Milli::ZERO),
        ),
        efficiency: recipe.efficiency_percent.scale(1, 100).round_to(2),
        ibu: recipe.ibu,
        bggu: bitterness_ratio(recipe.ibu, og),
        srm: recipe.color_ebc.scale(508, 1000).round_int(),
        losses: losses(recipe),
        bjcp_style_id: comment.bjcp_style().map(ToString::to_string),
        is_public: comment.is_public(),
        is_active: true,
        image_url: comment.image().map(ToString::to_string),
        unit_type_id: UNIT_TYPE_METRIC,
        recipe_type_id: RECIPE_TYPE_ALL_GRAIN,
        source: DEFAULT_SOURCE.to_string(),
        parent_recipe_id: None,
        fermentables: fermentables(recipe),
        hops: hops(recipe),
        yeasts: recipe.yeast.as_ref().and_then(yeast).into_iter().collect(),
        adjuncts: adjuncts(recipe),
        mash_steps: recipe
            .mash_steps
            .iter()
            .zip(0..)
            .map(|(rest, order)| MashEntry {
                order,
                name: rest.name.clone(),
                temperature: rest.temperature,
                time: rest.minutes,
            })
            .collect(),
        fermentation_steps: fermentation_steps(recipe, comment),
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Specific gravity from degrees Plato, three decimals.
pub fn plato_to_gravity(plato: Milli) -> Milli {
    let plato = plato.to_f64();
    Milli::from_f64(1.0 + plato / (258.6 - (plato / 258.2) * 227.1))
}

/// Degrees Lovibond from EBC, three decimals.
pub fn ebc_to_lovibond(ebc: Milli) -> Milli {
    Milli::from_f64(((ebc.to_f64() / 1.97) + 0.76) / 1.3546)
}

/// Calories per litre from original and residual extract (°P).
#[allow(clippy::cast_possible_truncation)]
pub fn calories(original: Milli, residual: Milli) -> i64 {
    let original = original.to_f64();
    let residual = residual.to_f64();
    let real_extract = 0.1808 * original + 0.1892 * residual;
    let density = 261.1 / (261.53 - residual);
    let alcohol_by_weight = (original - real_extract) / (2.0665 - 0.010665 * original);
    let kcal = ((6.9 * alcohol_by_weight + 4.0 * (real_extract - 0.1)) * density).round();
    let calories = (kcal * 3.55).round();
    if calories.is_finite() {
        calories as i64
    } else {
        0
    }
}

fn bitterness_ratio(ibu: Milli, og: Milli) -> Milli {
    let points = og.to_f64() - 1.0;
    if points <= 0.0 {
        return Milli::ZERO;
    }
    Milli::from_f64(ibu.to_f64() / points / 1000.0)
}

fn losses(recipe: &LocalRecipe) -> Option<Milli> {
    (recipe.pre_strain_volume.is_positive() && recipe.bottled_volume.is_positive())
        .then(|| (recipe.pre_strain_volume - recipe.bottled_volume).round_to(1))
}

/// Contact time as sent to the remote: minutes, or whole days from one day on.
fn contact_time(minutes: i64) -> i64 {
    if minutes >= MINUTES_PER_DAY {
        Milli::from_ratio(minutes, MINUTES_PER_DAY).round_int()
    } else {
        minutes.max(0)
    }
}

fn by_amount_desc(additions: impl Iterator<Item = Addition>) -> Vec<Addition> {
    let mut additions: Vec<_> = additions.collect();
    additions.sort_by_key(|addition| Reverse(addition.amount_g));
    additions
}

fn fermentables(recipe: &LocalRecipe) -> Vec<Fermentable> {
    let mut malts = recipe.malts.clone();
    malts.sort_by_key(|malt| Reverse(malt.share_percent));

    let malts = malts.into_iter().map(|malt| Fermentable {
        name: malt.name,
        ppg: Milli::from_int(MALT_PPG),
        lovibond: ebc_to_lovibond(malt.color_ebc),
        fermentable_usage_type_id: FermentableUsage::Mash.id(),
        amount: malt.amount_kg,
    });

    let others = by_amount_desc(
        recipe
            .additions
            .iter()
            .filter(|addition| addition.is_fermentable())
            .cloned(),
    )
    .into_iter()
    .map(|addition| {
        let usage = match addition.stage {
            AdditionStage::Mash => FermentableUsage::Mash,
            AdditionStage::Boil => FermentableUsage::Extract,
            AdditionStage::Fermentation => FermentableUsage::LateAddition,
        };
        Fermentable {
            name: addition.name,
            ppg: Milli::from_int(addition.yield_percent.scale(2, 5).round_int()),
            lovibond: ebc_to_lovibond(addition.color_ebc),
            fermentable_usage_type_id: usage.id(),
            amount: addition.amount_g.scale(1, 1000),
        }
    });

    malts.chain(others).collect()
}

const fn hop_form(pellets: bool) -> HopForm {
    // The local database does not tell leaf from plug.
    if pellets {
        HopForm::Pellet
    } else {
        HopForm::Plug
    }
}

fn hops(recipe: &LocalRecipe) -> Vec<Hop> {
    let mut first_wort: Vec<_> = recipe.hops.iter().filter(|hop| hop.first_wort).collect();
    first_wort.sort_by_key(|hop| Reverse(hop.amount_g));
    let mut kettle: Vec<_> = recipe.hops.iter().filter(|hop| !hop.first_wort).collect();
    kettle.sort_by_key(|hop| Reverse(hop.minutes));

    let first_wort = first_wort.into_iter().map(|hop| Hop {
        name: hop.name.clone(),
        aa: hop.alpha,
        hop_type_id: hop_form(hop.pellets).id(),
        hop_usage_type_id: HopUsage::FirstWort.id(),
        time: recipe.boil_minutes,
        amount: hop.amount_g,
        unit: None,
    });

    let kettle = kettle.into_iter().map(|hop| {
        let (usage, time) = if hop.minutes > 0 {
            (HopUsage::Boil, hop.minutes)
        } else {
            (HopUsage::Hopstand, 0)
        };
        Hop {
            name: hop.name.clone(),
            aa: hop.alpha,
            hop_type_id: hop_form(hop.pellets).id(),
            hop_usage_type_id: usage.id(),
            time,
            amount: hop.amount_g,
            unit: None,
        }
    });

    let dry = by_amount_desc(
        recipe
            .additions
            .iter()
            .filter(|addition| addition.is_hop && addition.stage == AdditionStage::Fermentation)
            .cloned(),
    )
    .into_iter()
    .map(|addition| {
        let (aa, form) = addition.hop.map_or((Milli::ZERO, HopForm::Pellet), |variety| {
            (variety.alpha, hop_form(variety.pellets))
        });
        Hop {
            name: addition.name,
            aa,
            hop_type_id: form.id(),
            hop_usage_type_id: HopUsage::DryHop.id(),
            time: contact_time(addition.duration_minutes),
            amount: addition.amount_g,
            unit: Some("g".to_string()),
        }
    });

    first_wort.chain(kettle).chain(dry).collect()
}

fn yeast(pitch: &YeastPitch) -> Option<Yeast> {
    if !pitch.units.is_positive() {
        return None;
    }

    let mut amount = pitch.units;
    let mut unit = if pitch.dry { "packets" } else { "vials" }.to_string();
    if let Some((size, size_unit)) = pitch.package.as_deref().and_then(parse_package) {
        amount = size.scale(pitch.units.raw(), 1000);
        unit = size_unit;
    }

    Some(Yeast {
        name: pitch.name.clone(),
        amount,
        unit,
        attenuation: pitch
            .attenuation_percent
            .map(|percent| Milli::from_ratio(percent, 100)),
    })
}

/// Split a package size like `11,5 g` into amount and a known unit.
fn parse_package(package: &str) -> Option<(Milli, String)> {
    let package = package.trim();
    let split = package
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(package.len());
    let (number, unit) = package.split_at(split);
    let amount: Milli = number.replace(',', ".").parse().ok()?;
    let unit = unit.trim();
    (amount.is_positive() && YEAST_UNITS.contains(&unit)).then(|| (amount, unit.to_string()))
}

fn adjuncts(recipe: &LocalRecipe) -> Vec<Adjunct> {
    by_amount_desc(
        recipe
            .additions
            .iter()
            .filter(|addition| !addition.is_hop && !addition.is_fermentable())
            .cloned(),
    )
    .into_iter()
    .map(|addition| {
        let usage = match addition.stage {
            AdditionStage::Mash => AdjunctUsage::Mash,
            AdditionStage::Boil if addition.duration_minutes == 0 => AdjunctUsage::Flameout,
            AdditionStage::Boil => AdjunctUsage::Boil,
            AdditionStage::Fermentation => AdjunctUsage::Primary,
        };
        Adjunct {
            name: addition.name,
            adjunct_usage_type_id: usage.id(),
            unit: "g".to_string(),
            amount: addition.amount_g,
            time: (addition.duration_minutes > 0).then(|| contact_time(addition.duration_minutes)),
        }
    })
    .collect()
}

fn fermentation_steps(recipe: &LocalRecipe, comment: &ParsedComment) -> Vec<FermentationEntry> {
    let intrinsic = if recipe.fermentation_steps.is_empty() {
        vec![FermentationStep::new(
            DEFAULT_FERMENTATION_NAME,
            DEFAULT_FERMENTATION_DAYS,
            Milli::from_int(DEFAULT_FERMENTATION_TEMPERATURE),
        )]
    } else {
        recipe.fermentation_steps.clone()
    };

    let steps = match comment.fermentation() {
        Some(fermentation) => fermentation.merge(&intrinsic),
        None => intrinsic,
    };

    steps
        .into_iter()
        .zip(0..)
        .map(|(step, order)| FermentationEntry {
            order,
            name: step.name,
            temperature: step.temperature,
            time: i64::from(step.days),
        })
        .collect()
}
