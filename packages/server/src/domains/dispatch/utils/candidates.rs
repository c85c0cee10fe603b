use crate::common::{GeoPoint, PartnerId};
use crate::domains::dispatch::models::{DispatchRequest, Partner};

/// Filters applied when looking for partners to notify
#[derive(Debug, Clone)]
pub struct CandidateQuery<'a> {
    pub origin: GeoPoint,
    pub service_class: Option<&'a str>,
    pub women_only: bool,
    pub rejected_by: &'a [PartnerId],
    /// None means no distance limit
    pub radius_km: Option<f64>,
}

impl<'a> CandidateQuery<'a> {
    pub fn for_request(request: &'a DispatchRequest, radius_km: Option<f64>) -> Self {
        Self {
            origin: request.origin_location,
            service_class: request.service_class.as_deref(),
            women_only: request.women_only,
            rejected_by: &request.rejected_by,
            radius_km,
        }
    }
}

/// A partner that passed every filter, with its distance from the origin
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub partner: Partner,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSearch {
    /// Nearest first
    pub candidates: Vec<Candidate>,
    /// Online (and, for women-only requests, eligible) partners considered
    pub online_count: usize,
    /// Of those, how many were skipped because they already rejected
    pub previously_rejected: usize,
}

/// Select and rank candidates from the partners of one kind
///
/// Pure; the caller fetches partners. Offline partners are ignored even if the
/// store returned them, and the women-only eligibility rule is always applied.
pub fn locate(partners: &[Partner], query: &CandidateQuery<'_>) -> CandidateSearch {
    let mut search = CandidateSearch::default();

    for partner in partners {
        if !partner.is_online {
            continue;
        }
        if query.women_only && !partner.is_women_only_eligible() {
            continue;
        }
        search.online_count += 1;

        if query.rejected_by.contains(&partner.id) {
            search.previously_rejected += 1;
            continue;
        }

        let Some(location) = partner.current_location else {
            continue;
        };

        if !partner.is_compatible_with(query.service_class) {
            continue;
        }

        let distance_km = query.origin.distance_km(&location);
        if query.radius_km.is_some_and(|radius| distance_km > radius) {
            continue;
        }

        search.candidates.push(Candidate {
            partner: partner.clone(),
            distance_km,
        });
    }

    search
        .candidates
        .sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    search
}
