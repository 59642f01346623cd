use super::GLOBAL_LIST_KEY;
use super::entry::MapEntry;
use dashmap::DashMap;
use std::sync::Arc;

/// Key → sorted entries; lists are replaced, never mutated in place.
pub type ResolveMaps = DashMap<String, Arc<Vec<MapEntry>>>;

/// One list being walked; holds its own snapshot of the entries.
struct Cursor {
    list: Arc<Vec<MapEntry>>,
    pos: usize,
}

impl Cursor {
    fn new(list: Arc<Vec<MapEntry>>) -> Self {
        Self { list, pos: 0 }
    }

    fn next(&mut self) -> Option<MapEntry> {
        let entry = self.list.get(self.pos)?.clone();
        self.pos += 1;
        Some(entry)
    }
}

/// Merges the global list with the path-scoped lists found by walking the
/// request path up to the root. Lists are looked up lazily as the walk
/// proceeds, so no lock is held between calls to `next`. The iterator keeps
/// the index generation it was created from.
pub struct MapEntryIterator {
    maps: Arc<ResolveMaps>,
    key: Option<String>,
    global: Cursor,
    special: Option<Cursor>,
    next_global: Option<MapEntry>,
    next_special: Option<MapEntry>,
    vanity_path_precedence: bool,
}

impl MapEntryIterator {
    pub fn new(request_path: &str, maps: Arc<ResolveMaps>, vanity_path_precedence: bool) -> Self {
        let global = maps
            .get(GLOBAL_LIST_KEY)
            .map(|l| Arc::clone(l.value()))
            .unwrap_or_default();
        Self {
            maps,
            key: start_key(request_path),
            global: Cursor::new(global),
            special: None,
            next_global: None,
            next_special: None,
            vanity_path_precedence,
        }
    }

    fn seek_special(&mut self) -> Option<MapEntry> {
        loop {
            if let Some(entry) = self.special.as_mut().and_then(Cursor::next) {
                return Some(entry);
            }
            self.special = None;
            let key = self.key.take()?;

            // drop selectors and extension of the last segment
            let last_slash = key.rfind('/').map(|i| i + 1).unwrap_or(0);
            let key = match key[last_slash..].find('.') {
                Some(dot) => key[..last_slash + dot].to_string(),
                None => key,
            };

            if let Some(list) = self.maps.get(&key) {
                self.special = Some(Cursor::new(Arc::clone(list.value())));
            }

            self.key = match key.rfind('/') {
                Some(idx) if key.len() > 1 && idx > 0 => Some(key[..idx].to_string()),
                _ => None,
            };
        }
    }
}

impl Iterator for MapEntryIterator {
    type Item = MapEntry;

    fn next(&mut self) -> Option<MapEntry> {
        if self.next_global.is_none() {
            self.next_global = self.global.next();
        }
        if self.next_special.is_none() {
            self.next_special = self.seek_special();
        }

        let take_global = match (&self.next_global, &self.next_special) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(_), Some(_)) if self.vanity_path_precedence => false,
            (Some(g), Some(s)) => g.pattern().len() >= s.pattern().len(),
        };
        if take_global {
            self.next_global.take()
        } else {
            self.next_special.take()
        }
    }
}

/// The path part of a map path: everything from its second `/` on.
fn start_key(request_path: &str) -> Option<String> {
    let first = request_path.find('/').map(|i| i + 1).unwrap_or(0);
    let second = request_path[first..].find('/')?;
    Some(request_path[first + second..].to_string())
}
