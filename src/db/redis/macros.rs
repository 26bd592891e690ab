/// Read-through caching on top of [`Cache`](crate::db::Cache).
///
/// Returns the cached value when present. On a miss the future is awaited,
/// its value queued for a background write with the given TTL, and returned.
/// A failing cache read is logged and treated as a miss, so the cache can
/// never fail the request it is fronting.
///
/// # Example
/// ```rust,ignore
/// let ranked: Vec<RankedBeverage> = cached!(cache, key, ttl, async {
///     ranker.rank_recommendations(user_id, &category, limit).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache.get_from_cache(&$key).await {
            Ok(Some(cached)) => Ok(cached),
            miss => {
                if let Err(e) = miss {
                    tracing::warn!(error = %e, key = %$key, "Cache read failed, computing directly");
                }
                match $block.await {
                    Ok(value) => {
                        $cache.set_in_background(&$key, &value, $ttl);
                        Ok(value)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }};
}
