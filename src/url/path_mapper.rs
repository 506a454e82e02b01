use crate::config::PathConfig;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Longest file stem produced, leaving room for `-dupN.html` within common filesystem limits
const MAX_STEM_LEN: usize = 200;

/// Maps a forum path+query to the local file that will hold the page
pub trait PathMapper: Send + Sync {
    /// Returns the output file for `path`, relative to the backup root with `/` separators
    ///
    /// Never returns a file already handed out for a different path.
    fn local_path_for(&self, path: &str) -> String;
}

/// Default mapper: slugified segments inside a folder chosen by the first character
///
/// `/f17-news/t5-hello` becomes `forums/f17-news_t5-hello.html` with the default folder table.
/// The forum root maps to `index.html`.
#[derive(Debug)]
pub struct SlugPathMapper {
    folder_mapping: BTreeMap<String, String>,
    slug_max_len: usize,
    claimed: Mutex<HashSet<String>>,
}

impl SlugPathMapper {
    pub fn new(config: &PathConfig) -> Self {
        Self {
            folder_mapping: config.folder_mapping.clone(),
            slug_max_len: config.slug_max_len.max(1),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Creates a mapper that treats `claimed` files as already taken
    ///
    /// Seeded from the crawl state on resume so new pages never reuse an earlier file.
    pub fn with_claimed<I>(config: &PathConfig, claimed: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mapper = Self::new(config);
        mapper
            .claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(claimed);
        mapper
    }

    /// Collision-free base name (`folder/stem`) for `path`, before the `.html` suffix
    fn base_name(&self, path: &str) -> String {
        let (route, query) = match path.split_once('?') {
            Some((route, query)) => (route, Some(query)),
            None => (path, None),
        };
        let route = decode(route.trim_start_matches('/')).to_lowercase();

        if route.is_empty() && query.map_or(true, str::is_empty) {
            return "index".to_string();
        }

        let first_char = route.chars().next().map(String::from).unwrap_or_default();
        let folder = self
            .folder_mapping
            .get(&first_char)
            .map(String::as_str)
            .unwrap_or("misc");

        let mut stem = route
            .split('/')
            .map(|segment| slugify(segment, self.slug_max_len))
            .filter(|slug| !slug.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        if stem.is_empty() {
            stem.push_str("index");
        }

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let query_slug = query
                .split('&')
                .map(|pair| slugify(&decode(&pair.replace('=', "-")), self.slug_max_len))
                .filter(|slug| !slug.is_empty())
                .collect::<Vec<_>>()
                .join("_");
            if !query_slug.is_empty() {
                stem.push('_');
                stem.push_str(&query_slug);
            }
        }

        format!("{}/{}", folder, truncate_chars(&stem, MAX_STEM_LEN))
    }
}

impl PathMapper for SlugPathMapper {
    fn local_path_for(&self, path: &str) -> String {
        let base = self.base_name(path);
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);

        let mut candidate = format!("{}.html", base);
        let mut dup = 1;
        while claimed.contains(&candidate) {
            candidate = format!("{}-dup{}.html", base, dup);
            dup += 1;
        }
        claimed.insert(candidate.clone());
        candidate
    }
}

fn decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

/// Lowercase ASCII slug: accents folded, every other non-alphanumeric run becomes one `-`
fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        let folded = fold_accent(c);
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    truncate_chars(&slug, max_len)
        .trim_end_matches('-')
        .to_string()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_mapper() -> SlugPathMapper {
        let mut config = PathConfig::default();
        config.folder_mapping.insert("f".to_string(), "categorias".to_string());
        SlugPathMapper::new(&config)
    }

    #[test]
    fn test_root_maps_to_index() {
        let mapper = create_test_mapper();
        assert_eq!(mapper.local_path_for("/"), "index.html");
        assert_eq!(mapper.local_path_for(""), "index-dup1.html");
    }

    #[test]
    fn test_basic_mapping() {
        let mapper = create_test_mapper();
        assert_eq!(
            mapper.local_path_for("/f17-something"),
            "categorias/f17-something.html"
        );
        assert_eq!(mapper.local_path_for("/t5-Hello_World"), "topics/t5-hello-world.html");
        assert_eq!(mapper.local_path_for("/zz/top"), "misc/zz_top.html");
    }

    #[test]
    fn test_query_and_encoding() {
        let mapper = create_test_mapper();
        assert_eq!(
            mapper.local_path_for("/t5-hello?start=10&view=next"),
            "topics/t5-hello_start-10_view-next.html"
        );
        assert_eq!(
            mapper.local_path_for("/t9-S%C3%A3o%20Paulo"),
            "topics/t9-sao-paulo.html"
        );
        assert_eq!(mapper.local_path_for("/?page=2"), "misc/index_page-2.html");
    }

    #[test]
    fn test_collisions_get_dup_suffix() {
        let mapper = create_test_mapper();
        assert_eq!(mapper.local_path_for("/t1-a-b"), "topics/t1-a-b.html");
        assert_eq!(mapper.local_path_for("/t1-a.b"), "topics/t1-a-b-dup1.html");
        assert_eq!(mapper.local_path_for("/t1-a!b"), "topics/t1-a-b-dup2.html");
    }

    #[test]
    fn test_claimed_paths_are_skipped() {
        let mapper = SlugPathMapper::with_claimed(
            &PathConfig::default(),
            vec!["topics/t1-a.html".to_string()],
        );
        assert_eq!(mapper.local_path_for("/t1-a"), "topics/t1-a-dup1.html");
    }

    #[test]
    fn test_slugify_truncates() {
        assert_eq!(slugify("Olá, Mundo!", 120), "ola-mundo");
        assert_eq!(slugify("abc-def", 4), "abc");
        assert_eq!(slugify("---", 10), "");
    }
}
