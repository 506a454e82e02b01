use crate::crawler::context::CrawlContext;
use crate::url::path_plus_query;
use crate::Result;
use url::Url;

/// Records an internal redirect from `src_url` to `dst_url`
///
/// Returns `false` without touching any store when both URLs share the same path+query or the
/// destination is on another domain. Otherwise the redirect is recorded, the source becomes a
/// terminal redirect source, and the destination is enqueued if it passes the link filters.
///
/// # Returns
///
/// `true` if the redirect was handled and the caller should stop processing the source
pub fn handle_redirect(
    ctx: &CrawlContext,
    worker: &str,
    src_url: &Url,
    dst_url: &Url,
) -> Result<bool> {
    let src = path_plus_query(src_url);
    let dst = path_plus_query(dst_url);

    if src == dst || !ctx.site().is_same_domain(dst_url) {
        return Ok(false);
    }

    ctx.redirects.record(&src, &dst)?;
    ctx.store.mark_redirect_source(&src)?;

    match ctx.filter.key_for(dst_url) {
        Some(key) => {
            ctx.enqueue([key])?;
        }
        None => tracing::debug!("[{}] Redirect target {} is filtered, not enqueued", worker, dst),
    }

    tracing::info!("[{}] Redirect {} -> {}", worker, src, dst);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::context::create_test_context;
    use crate::state::UrlStatus;
    use crate::storage::PersistentStore;
    use tempfile::TempDir;

    #[test]
    fn test_internal_redirect_is_recorded() {
        let dir = TempDir::new().unwrap();
        let ctx = create_test_context("https://forum.example.com", dir.path());
        ctx.store.add_url("/t1-old", "topics/t1-old.html").unwrap();

        let src = Url::parse("https://forum.example.com/t1-old").unwrap();
        let dst = Url::parse("https://forum.example.com/t1-new?view=1").unwrap();
        assert!(handle_redirect(&ctx, "D1", &src, &dst).unwrap());

        assert_eq!(ctx.redirects.get("/t1-old").as_deref(), Some("/t1-new?view=1"));
        let source = ctx.store.get("/t1-old").unwrap();
        assert!(source.is_redirect_source);
        assert_eq!(source.status, UrlStatus::Failed);
        assert_eq!(ctx.store.get("/t1-new?view=1").unwrap().status, UrlStatus::Queued);
    }

    #[test]
    fn test_same_path_and_external_are_not_handled() {
        let dir = TempDir::new().unwrap();
        let ctx = create_test_context("https://forum.example.com", dir.path());
        let src = Url::parse("https://forum.example.com/t1").unwrap();

        let same = Url::parse("https://forum.example.com/t1#top").unwrap();
        assert!(!handle_redirect(&ctx, "D1", &src, &same).unwrap());

        let external = Url::parse("https://elsewhere.example/t1").unwrap();
        assert!(!handle_redirect(&ctx, "D1", &src, &external).unwrap());

        assert!(ctx.redirects.is_empty());
        assert!(ctx.store.is_empty());
    }
}
