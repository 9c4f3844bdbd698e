//! Request splitting for backends with a per-request metric cap (§4.F
//! "Request splitting").

use carbon_zipper_types::FetchRequest;

/// Packs resolved `leaves` (one [`FetchRequest`] per concrete leaf, already
/// carrying the originating metric's start/stop/pathExpression/
/// filterFunctions) into chunks of at most `cap` requests each.
///
/// `cap == 0` is unlimited and is handled by the caller before this is
/// invoked; this function always produces at least one chunk when `leaves`
/// is non-empty.
pub fn chunk_leaves(leaves: Vec<FetchRequest>, cap: usize) -> Vec<Vec<FetchRequest>> {
    if cap == 0 {
        return vec![leaves];
    }
    leaves.chunks(cap).map(|chunk| chunk.to_vec()).collect()
}
