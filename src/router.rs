//! Realm-to-endpoint routing.
//!
//! The router is built once at startup and shared read-only. Lookups never fail: an unknown realm
//! key resolves to the default entry, and a wrong address surfaces later as the downstream
//! network error.

// std
use std::collections::BTreeMap;
// crates.io
use url::Url;
// self
use crate::{_prelude::*, security};

/// Routing data for a single realm key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealmEntry {
	/// Lower-cased realm key.
	pub key: String,
	/// Canonical `host[:port]` of the base URI.
	pub host: String,
	/// Public base URI of the identity provider serving the realm.
	pub base_uri: Url,
}

/// Maps realm keys to the base address of the identity provider serving them.
#[derive(Clone, Debug)]
pub struct RealmRouter {
	default_key: String,
	entries: BTreeMap<String, RealmEntry>,
}
impl RealmRouter {
	/// Build a router from `(realm key, base URI)` pairs.
	///
	/// Fails when no entry is supplied, when `default_key` is not one of the keys, when two keys
	/// differ only by case, or when a base URI has no host.
	pub fn new<I, K, V>(entries: I, default_key: &str) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let mut parsed = BTreeMap::new();

		for (key, base_uri) in entries {
			let key = key.as_ref().to_lowercase();
			let entry = parse_entry(key.clone(), base_uri.as_ref())?;

			if parsed.insert(key.clone(), entry).is_some() {
				return Err(Error::config(
					"realm_public_uri_map",
					format!("Realm key '{key}' is declared more than once."),
				));
			}
		}

		if parsed.is_empty() {
			return Err(Error::config("realm_public_uri_map", "Entries must not be empty."));
		}

		let default_key = default_key.to_lowercase();

		if !parsed.contains_key(&default_key) {
			return Err(Error::config(
				"default_key",
				format!("Default key '{default_key}' is not one of the configured realms."),
			));
		}

		Ok(Self { default_key, entries: parsed })
	}

	/// Lower-cased key of the default realm.
	pub fn default_key(&self) -> &str {
		&self.default_key
	}

	/// The default realm entry.
	pub fn default_entry(&self) -> &RealmEntry {
		// Construction guarantees the default key is present.
		&self.entries[&self.default_key]
	}

	/// Resolve a realm key, falling back to the default entry when it is unknown.
	pub fn resolve(&self, realm_key: &str) -> &RealmEntry {
		self.get(realm_key).unwrap_or_else(|| self.default_entry())
	}

	/// Exact lookup without the default fallback.
	pub fn get(&self, realm_key: &str) -> Option<&RealmEntry> {
		self.entries.get(&realm_key.to_lowercase())
	}

	/// Whether `realm_key` names a configured realm.
	pub fn contains(&self, realm_key: &str) -> bool {
		self.get(realm_key).is_some()
	}

	/// Every distinct base URI, default realm first.
	pub fn all_base_uris(&self) -> Vec<Url> {
		let mut uris = vec![self.default_entry().base_uri.clone()];

		for entry in self.entries.values() {
			if !uris.contains(&entry.base_uri) {
				uris.push(entry.base_uri.clone());
			}
		}

		uris
	}

	/// Visit every entry as `(realm key, host, base URI)`.
	pub fn for_each<F>(&self, mut callback: F)
	where
		F: FnMut(&str, &str, &Url),
	{
		for entry in self.entries.values() {
			callback(&entry.key, &entry.host, &entry.base_uri);
		}
	}

	/// Iterate over all entries ordered by key.
	pub fn entries(&self) -> impl Iterator<Item = &RealmEntry> {
		self.entries.values()
	}
}

/// Build `{base}/auth/realms/{realm}/{tail...}` with each segment percent-encoded.
pub fn realm_url(base_uri: &Url, realm: &str, tail: &[&str]) -> Result<Url> {
	let mut url = base_uri.clone();

	url.set_query(None);
	url.set_fragment(None);

	{
		let mut segments = url.path_segments_mut().map_err(|_| {
			Error::config("base_uri", format!("Cannot append path segments to {base_uri}."))
		})?;

		segments.pop_if_empty().extend(["auth", "realms", realm]).extend(tail);
	}

	Ok(url)
}

fn parse_entry(key: String, raw: &str) -> Result<RealmEntry> {
	let base_uri = Url::parse(raw.trim()).map_err(|err| {
		Error::config("realm_public_uri_map", format!("Cannot parse URL {raw}: {err}."))
	})?;
	let host = security::canonical_authority(&base_uri).ok_or_else(|| {
		Error::config("realm_public_uri_map", format!("URL {raw} must include a host component."))
	})?;

	Ok(RealmEntry { key, host, base_uri })
}
