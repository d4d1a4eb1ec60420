//! Per-category teleport allocation for topic-sensitive ranking.
//!
//! A category's personalized solve teleports with probability `total` (so its damping factor is
//! `1 - total`), landing uniformly on the category's teleport set. The two policies differ only
//! in how `total` is chosen:
//!
//! - [`TeleportPolicy::Uniform`]: every category teleports with the global probability; the
//!   per-item share shrinks as the category grows.
//! - [`TeleportPolicy::Proportional`]: every item gets the reference category's per-item share,
//!   so a category's total scales with its size.

use std::collections::BTreeMap;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TeleportPolicy {
    Uniform,
    #[default]
    Proportional,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TeleportShare {
    /// Total teleport probability of the category's personalized solve.
    pub total: f64,
    /// Teleport probability landing on each member (`total / members`).
    pub per_item: f64,
    pub members: usize,
}

impl TeleportShare {
    /// Damping factor for this category's personalized solve.
    pub fn damping_factor(&self) -> f64 {
        1.0 - self.total
    }
}

/// Compute the teleport share of every category with at least one member.
///
/// Categories with zero members get no entry. `reference` is only consulted by the
/// proportional policy, which fails if the reference category is empty or unknown, or if some
/// category is large enough that its share reaches a total of 1.
pub fn allocate(
    counts: &BTreeMap<String, usize>,
    teleport_probability: f64,
    policy: TeleportPolicy,
    reference: &str,
) -> Result<BTreeMap<String, TeleportShare>> {
    if !(teleport_probability > 0.0 && teleport_probability < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "teleport probability must lie in (0, 1), got {teleport_probability}"
        )));
    }

    let populated = counts.iter().filter(|(_, &c)| c > 0);
    let shares: BTreeMap<String, TeleportShare> = match policy {
        TeleportPolicy::Uniform => populated
            .map(|(cat, &members)| {
                let share = TeleportShare {
                    total: teleport_probability,
                    per_item: teleport_probability / members as f64,
                    members,
                };
                (cat.clone(), share)
            })
            .collect(),
        TeleportPolicy::Proportional => {
            let reference_count = counts.get(reference).copied().unwrap_or(0);
            if reference_count == 0 {
                return Err(Error::MissingReferenceCategory(reference.to_string()));
            }
            let per_item = teleport_probability / reference_count as f64;
            populated
                .map(|(cat, &members)| {
                    let total = per_item * members as f64;
                    // Damping `1 - total` must stay in (0, 1).
                    if total >= 1.0 {
                        return Err(Error::InvalidConfig(format!(
                            "category {cat:?} has {members} members against {reference_count} \
                             in reference {reference:?}: teleport share {total} leaves no damping"
                        )));
                    }
                    Ok((cat.clone(), TeleportShare { total, per_item, members }))
                })
                .collect::<Result<_>>()?
        }
    };
    Ok(shares)
}

/// Teleport vector spreading unit mass evenly over `members`.
pub fn category_teleport(members: &[usize], item_count: usize) -> Result<Vec<f64>> {
    if members.is_empty() {
        return Err(Error::InvalidTeleport("teleport set is empty".to_string()));
    }
    let mass = 1.0 / members.len() as f64;
    let mut teleport = vec![0.0; item_count];
    for &id in members {
        let slot = teleport.get_mut(id).ok_or_else(|| {
            Error::InvalidTeleport(format!("member {id} out of range for {item_count} items"))
        })?;
        *slot = mass;
    }
    Ok(teleport)
}
