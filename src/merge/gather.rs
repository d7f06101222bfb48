//! Merge gathering - read-only lookups feeding the planner

use super::plan::{MergeCandidate, ReviewInfo};
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::stack::Forest;
use crate::types::PrState;
use tracing::debug;

/// Branches to land, root first: the branch's tracked ancestors and the
/// branch itself with `all`, otherwise just the branch.
pub fn merge_chain(forest: &Forest, branch: &str, all: bool) -> Result<Vec<String>> {
    if !forest.is_tracked(branch) {
        return Err(Error::BranchNotTracked(branch.to_string()));
    }
    let mut chain = if all {
        forest.ancestors(branch)?
    } else {
        Vec::new()
    };
    chain.push(branch.to_string());
    Ok(chain)
}

/// Fetch review state for every branch in `chain`.
///
/// Readiness is only requested for open review requests.
pub async fn gather_merge_candidates(
    forest: &Forest,
    platform: &dyn PlatformService,
    chain: &[String],
) -> Result<Vec<MergeCandidate>> {
    let mut candidates = Vec::with_capacity(chain.len());

    for branch in chain {
        let tracked = forest
            .get(branch)
            .ok_or_else(|| Error::BranchNotTracked(branch.clone()))?;

        let frozen_children = forest
            .children(branch)
            .iter()
            .filter(|c| forest.get(c).is_some_and(|b| b.frozen))
            .cloned()
            .collect();

        let review = match tracked.review_id {
            Some(number) => {
                debug!(branch = %branch, number, "fetching review state");
                let details = platform.get_pr_details(number).await?;
                let readiness = if details.state == PrState::Open {
                    Some(platform.check_merge_readiness(number).await?)
                } else {
                    None
                };
                Some(ReviewInfo { details, readiness })
            }
            None => None,
        };

        candidates.push(MergeCandidate {
            branch: branch.clone(),
            parent: tracked.parent.clone(),
            frozen: tracked.frozen,
            frozen_children,
            review,
        });
    }

    Ok(candidates)
}
