/// Split `ids` into consecutive groups of at most `limit` entries
///
/// Order and duplicates are preserved; no group is ever empty. A `limit` of
/// zero is treated as one.
pub fn partition<T: Clone>(ids: &[T], limit: usize) -> Vec<Vec<T>> {
    ids.chunks(limit.max(1)).map(<[T]>::to_vec).collect()
}
