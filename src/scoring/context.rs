//! Context join
//!
//! Resolves the per-event inputs the risk model needs: economic snapshot
//! ((state, lga) exact match, state-level fallback), climate zone by
//! point-in-polygon, nearest mining site by haversine, border zone by
//! state, strategic indicators by state, urban classification.
//!
//! Every join is optional. Missing coordinates skip the geospatial joins;
//! missing reference tables skip their modifiers. Nothing here aborts a
//! scoring pass.

use crate::artifacts::ReferenceData;
use crate::scoring::geo::{nearest_site, point_in_ring};
use crate::scoring::model::ScoringContext;
use crate::scoring::urban::is_urban_lga;
use crate::store::DocumentStore;
use crate::types::{EconomicSnapshot, GeoPoint, ParsedEvent};
use tracing::debug;

/// Build the scoring context for one event against the current reference
/// tables.
pub fn resolve_context<'a>(
    event: &ParsedEvent,
    store: &DocumentStore,
    reference: &'a ReferenceData,
) -> ScoringContext<'a> {
    let economic = match store.economic_for(&event.state, &event.lga) {
        Ok(Some(record)) => Some(EconomicSnapshot {
            fuel_price: record.fuel_price,
            inflation: record.inflation_rate,
        }),
        Ok(None) => None,
        Err(e) => {
            debug!(state = %event.state, lga = %event.lga, error = %e, "Economic join failed");
            None
        }
    };

    let location = event.location;
    let climate_zone = location.and_then(|point| {
        reference
            .climate_zones
            .iter()
            .find(|zone| point_in_ring(point, &zone.ring))
    });
    let nearest_mine = location.and_then(|point| locate_mine(point, reference));

    ScoringContext {
        economic,
        climate_zone,
        nearest_mine,
        border_zone: reference.border_zone_for(&event.state),
        strategic: reference.strategic_for(&event.state),
        location,
        is_urban: is_urban_lga(&event.lga),
    }
}

fn locate_mine(
    point: GeoPoint,
    reference: &ReferenceData,
) -> Option<(&crate::types::MiningSite, f64)> {
    nearest_site(point, &reference.mining_sites)
}
