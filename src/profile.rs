//! Realm user-profile schema and the collaborator that fetches it.

// std
use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	fmt::{Debug, Formatter, Result as FmtResult},
};
// crates.io
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
// self
use crate::{
	_prelude::*,
	http::{client, forwarded::ForwardingTransport, transport::HttpTransport},
	router::RealmRouter,
};

/// Annotation marking an attribute as dynamic.
pub const DYNAMIC_ANNOTATION: &str = "dynamic";
/// Realm attribute telling whether declarative user profiles are enabled.
pub const USER_PROFILE_ENABLED_ATTRIBUTE: &str = "userProfileEnabled";

/// Boxed future returned by [`ProfileRetriever`] methods.
pub type RetrieverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Profile used for realms without declarative user profiles.
pub type DefaultProfileProvider = Arc<dyn Fn(&str) -> Result<UserProfile> + Send + Sync>;

/// Fetches realm metadata and user-profile schemas from the identity provider.
pub trait ProfileRetriever
where
	Self: 'static + Send + Sync,
{
	/// Summary of `realm`.
	fn realm<'a>(
		&'a self,
		access_token: &'a str,
		realm: &'a str,
	) -> RetrieverFuture<'a, RealmSummary>;

	/// User-profile schema of `realm`.
	fn user_profile<'a>(
		&'a self,
		access_token: &'a str,
		realm: &'a str,
	) -> RetrieverFuture<'a, UserProfile>;
}

/// The parts of a realm representation the profile cache reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmSummary {
	#[allow(missing_docs)]
	#[serde(default)]
	pub id: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub realm: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub enabled: Option<bool>,
	/// Free-form realm attributes; values may be `null`.
	#[serde(default)]
	pub attributes: BTreeMap<String, Option<String>>,
}
impl RealmSummary {
	/// Whether the realm attribute `userProfileEnabled` is `"true"` (any case).
	pub fn is_user_profile_enabled(&self) -> bool {
		self.attributes
			.get(USER_PROFILE_ENABLED_ATTRIBUTE)
			.and_then(Option::as_deref)
			.is_some_and(|value| value.eq_ignore_ascii_case("true"))
	}
}

/// Roles or scopes for which an attribute is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAttributeRequired {
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub roles: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
}

/// Who may view or edit an attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAttributePermissions {
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub view: Vec<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub edit: Vec<String>,
}

/// Scopes under which an attribute is exposed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAttributeSelector {
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
}

/// One attribute of a realm's user profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAttribute {
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub group: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub required: Option<ProfileAttributeRequired>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permissions: Option<ProfileAttributePermissions>,
	/// Validator name to its options (`length`, `pattern`, `options`, ...).
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub validations: BTreeMap<String, Map<String, Value>>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selector: Option<ProfileAttributeSelector>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub annotations: BTreeMap<String, String>,
}
impl ProfileAttribute {
	/// Whether annotation `key` is `"true"` (any case).
	pub fn is_annotation_true(&self, key: &str) -> bool {
		self.annotation_equals_ignore_case(key, "true")
	}

	/// Whether annotation `key` is `"false"` (any case).
	pub fn is_annotation_false(&self, key: &str) -> bool {
		self.annotation_equals_ignore_case(key, "false")
	}

	#[allow(missing_docs)]
	pub fn annotation_equals_ignore_case(&self, key: &str, value: &str) -> bool {
		self.annotation_matches(key, |annotation| annotation.eq_ignore_ascii_case(value))
	}

	/// Apply `matcher` to annotation `key`; absent annotations never match.
	pub fn annotation_matches<F>(&self, key: &str, matcher: F) -> bool
	where
		F: FnOnce(&str) -> bool,
	{
		self.annotations.get(key).is_some_and(|value| matcher(value))
	}
}

/// Display group of profile attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileGroup {
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_header: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_description: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub annotations: BTreeMap<String, String>,
}

/// A realm's user-profile schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
	#[allow(missing_docs)]
	#[serde(default)]
	pub attributes: Vec<ProfileAttribute>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub groups: Vec<ProfileGroup>,
	#[serde(skip)]
	dynamic_attribute_keys: BTreeSet<String>,
}
impl UserProfile {
	/// Recompute the set of dynamic attribute names from the annotations.
	pub fn index_dynamic_attributes(&mut self) {
		self.dynamic_attribute_keys = self
			.attributes
			.iter()
			.filter(|attribute| attribute.is_annotation_true(DYNAMIC_ANNOTATION))
			.filter_map(|attribute| attribute.name.clone())
			.collect();
	}

	/// Names of the attributes annotated as dynamic, sorted.
	pub fn dynamic_attribute_keys(&self) -> impl Iterator<Item = &str> {
		self.dynamic_attribute_keys.iter().map(String::as_str)
	}

	#[allow(missing_docs)]
	pub fn is_dynamic_attribute(&self, name: &str) -> bool {
		self.dynamic_attribute_keys.contains(name)
	}

	/// Attribute named `name`.
	pub fn attribute(&self, name: &str) -> Option<&ProfileAttribute> {
		self.attributes.iter().find(|attribute| attribute.name.as_deref() == Some(name))
	}
}

/// [`ProfileRetriever`] backed by the identity provider's admin API.
pub struct HttpProfileRetriever {
	router: Arc<RealmRouter>,
	transports: HashMap<String, Arc<dyn HttpTransport>>,
	max_response_bytes: u64,
}
impl HttpProfileRetriever {
	/// Build a retriever reaching every realm of `router`, forwarded through `internal_uri`
	/// when it is set.
	pub fn new(
		router: Arc<RealmRouter>,
		transport: Arc<dyn HttpTransport>,
		internal_uri: Option<&Url>,
		max_response_bytes: u64,
	) -> Result<Self> {
		let mut transports = HashMap::new();

		for entry in router.entries() {
			let routed =
				ForwardingTransport::for_realm(transport.clone(), internal_uri, &entry.base_uri)?;

			transports.insert(entry.key.clone(), routed);
		}

		Ok(Self { router, transports, max_response_bytes })
	}

	async fn get<T>(&self, access_token: &str, realm: &str, tail: &[&str]) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		let entry = self.router.resolve(realm);
		let transport = self
			.transports
			.get(&entry.key)
			.ok_or_else(|| Error::UnknownRealm { realm: realm.to_owned() })?;
		let url = admin_url(&entry.base_uri, realm, tail)?;

		client::get_json(transport.as_ref(), &url, Some(access_token), self.max_response_bytes).await
	}
}
impl Debug for HttpProfileRetriever {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("HttpProfileRetriever")
			.field("realms", &self.transports.keys().collect::<Vec<_>>())
			.finish_non_exhaustive()
	}
}
impl ProfileRetriever for HttpProfileRetriever {
	fn realm<'a>(
		&'a self,
		access_token: &'a str,
		realm: &'a str,
	) -> RetrieverFuture<'a, RealmSummary> {
		Box::pin(self.get(access_token, realm, &[]))
	}

	fn user_profile<'a>(
		&'a self,
		access_token: &'a str,
		realm: &'a str,
	) -> RetrieverFuture<'a, UserProfile> {
		Box::pin(self.get(access_token, realm, &["users", "profile"]))
	}
}

/// Build `{base}/auth/admin/realms/{realm}/{tail...}` with each segment percent-encoded.
pub fn admin_url(base_uri: &Url, realm: &str, tail: &[&str]) -> Result<Url> {
	let mut url = base_uri.clone();

	url.set_query(None);
	url.set_fragment(None);

	{
		let mut segments = url.path_segments_mut().map_err(|_| {
			Error::config("base_uri", format!("Cannot append path segments to {base_uri}."))
		})?;

		segments.pop_if_empty().extend(["auth", "admin", "realms", realm]).extend(tail);
	}

	Ok(url)
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::{StatusCode, header::AUTHORIZATION};
	// self
	use super::*;
	use crate::http::transport::stub::StubTransport;

	const PROFILE: &str = r#"{
		"attributes": [
			{ "name": "username", "displayName": "${username}", "validations": { "length": { "min": 3 } } },
			{ "name": "nationality", "annotations": { "dynamic": "TRUE" }, "required": { "roles": ["user"] } },
			{ "name": "birthDate", "annotations": { "dynamic": "false" } },
			{ "name": "locale", "annotations": { "dynamic": "true" }, "permissions": { "view": ["admin"] } }
		],
		"groups": [{ "name": "user-metadata", "displayHeader": "User metadata" }]
	}"#;

	#[test]
	fn dynamic_attributes_follow_the_annotation() {
		let mut profile: UserProfile = serde_json::from_str(PROFILE).expect("profile");

		assert!(!profile.is_dynamic_attribute("nationality"));

		profile.index_dynamic_attributes();

		assert_eq!(profile.dynamic_attribute_keys().collect::<Vec<_>>(), ["locale", "nationality"]);
		assert!(profile.is_dynamic_attribute("locale"));
		assert!(!profile.is_dynamic_attribute("birthDate"));
		assert_eq!(profile.groups[0].display_header.as_deref(), Some("User metadata"));
		assert_eq!(profile.attribute("username").unwrap().validations["length"]["min"], 3);
	}

	#[test]
	fn annotation_helpers_ignore_case_and_absence() {
		let profile: UserProfile = serde_json::from_str(PROFILE).expect("profile");
		let nationality = profile.attribute("nationality").unwrap();
		let birth_date = profile.attribute("birthDate").unwrap();
		let username = profile.attribute("username").unwrap();

		assert!(nationality.is_annotation_true("dynamic"));
		assert!(birth_date.is_annotation_false("dynamic"));
		assert!(!username.is_annotation_true("dynamic"));
		assert!(!username.is_annotation_false("dynamic"));
		assert!(nationality.annotation_matches("dynamic", |value| value == "TRUE"));
	}

	#[test]
	fn user_profile_flag_is_read_from_realm_attributes() {
		let enabled: RealmSummary = serde_json::from_str(
			r#"{ "realm": "r1", "attributes": { "userProfileEnabled": "True" } }"#,
		)
		.unwrap();
		let disabled: RealmSummary = serde_json::from_str(
			r#"{ "realm": "r1", "attributes": { "userProfileEnabled": "false" } }"#,
		)
		.unwrap();
		let null: RealmSummary =
			serde_json::from_str(r#"{ "attributes": { "userProfileEnabled": null } }"#).unwrap();

		assert!(enabled.is_user_profile_enabled());
		assert!(!disabled.is_user_profile_enabled());
		assert!(!null.is_user_profile_enabled());
		assert!(!RealmSummary::default().is_user_profile_enabled());
	}

	#[tokio::test]
	async fn http_retriever_calls_admin_endpoints_with_bearer() {
		let stub = StubTransport::new();

		stub.route("/auth/admin/realms/r1", StatusCode::OK, r#"{ "realm": "r1" }"#);
		stub.route("/auth/admin/realms/r1/users/profile", StatusCode::OK, PROFILE);

		let router = Arc::new(
			RealmRouter::new(
				[("r1", "https://eu.example.com"), ("r2", "https://us.example.com")],
				"r2",
			)
			.unwrap(),
		);
		let retriever = HttpProfileRetriever::new(router, stub.clone(), None, 64 * 1024).unwrap();
		let summary = retriever.realm("admin-token", "r1").await.expect("realm");
		let profile = retriever.user_profile("admin-token", "r1").await.expect("profile");

		assert_eq!(summary.realm.as_deref(), Some("r1"));
		assert_eq!(profile.attributes.len(), 4);

		let seen = stub.seen();

		assert_eq!(seen[0].0, "https://eu.example.com/auth/admin/realms/r1");
		assert_eq!(seen[1].1.get(AUTHORIZATION).unwrap(), "Bearer admin-token");
	}
}
