use crate::error::ValidationError;
use spine_types::Attributes;

/// Per-call options shared by record and set operations.
///
/// Flags an operation does not understand are ignored, so one value can be
/// passed down a call chain (a set passes its options to the member `set`
/// calls it makes during a merge). Options also travel inside every event
/// payload.
///
/// Tri-state fields are `None` when the caller did not decide; each
/// operation applies its own default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Suppress events.
    pub silent: bool,
    /// Remove the given attributes instead of assigning them.
    pub unset: bool,
    /// Run the validation hook. Off for `set`, on for `save`.
    pub validate: Option<bool>,
    /// Run the parse hook on incoming data. On for `fetch` and `save`.
    pub parse: Option<bool>,
    /// Defer local changes until the server confirms.
    pub wait: bool,
    /// `save` sends only the given attributes with PATCH.
    pub patch: bool,
    /// A set's `fetch` resets instead of reconciling.
    pub reset: bool,

    /// Reconciliation toggles. All default to on for `set`.
    pub add: Option<bool>,
    pub remove: Option<bool>,
    pub merge: Option<bool>,
    /// Insertion position; negative counts from the end.
    pub at: Option<isize>,
    /// `Some(false)` keeps the comparator from reordering.
    pub sort: Option<bool>,

    /// Request location override.
    pub url: Option<String>,
    /// Request body override.
    pub attrs: Option<Attributes>,
    pub emulate_http: Option<bool>,
    pub emulate_json: Option<bool>,

    /// Filled in for `"add"` and `"remove"` events.
    pub index: Option<usize>,
    /// Filled in for `"invalid"` events.
    pub validation_error: Option<ValidationError>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    #[must_use]
    pub fn unset(mut self) -> Self {
        self.unset = true;
        self
    }

    #[must_use]
    pub fn validate(mut self, on: bool) -> Self {
        self.validate = Some(on);
        self
    }

    #[must_use]
    pub fn parse(mut self, on: bool) -> Self {
        self.parse = Some(on);
        self
    }

    #[must_use]
    pub fn wait(mut self) -> Self {
        self.wait = true;
        self
    }

    #[must_use]
    pub fn patch(mut self) -> Self {
        self.patch = true;
        self
    }

    #[must_use]
    pub fn reset(mut self) -> Self {
        self.reset = true;
        self
    }

    #[must_use]
    pub fn add(mut self, on: bool) -> Self {
        self.add = Some(on);
        self
    }

    #[must_use]
    pub fn remove(mut self, on: bool) -> Self {
        self.remove = Some(on);
        self
    }

    #[must_use]
    pub fn merge(mut self, on: bool) -> Self {
        self.merge = Some(on);
        self
    }

    #[must_use]
    pub fn at(mut self, index: isize) -> Self {
        self.at = Some(index);
        self
    }

    #[must_use]
    pub fn sort(mut self, on: bool) -> Self {
        self.sort = Some(on);
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = Some(attrs);
        self
    }

    #[must_use]
    pub fn emulate_http(mut self, on: bool) -> Self {
        self.emulate_http = Some(on);
        self
    }

    #[must_use]
    pub fn emulate_json(mut self, on: bool) -> Self {
        self.emulate_json = Some(on);
        self
    }

    pub(crate) fn validates(&self) -> bool {
        self.validate.unwrap_or(false)
    }

    pub(crate) fn parses(&self) -> bool {
        self.parse.unwrap_or(false)
    }

    /// Fills in defaults the caller left undecided.
    pub(crate) fn or_defaults(mut self, validate: bool, parse: bool) -> Self {
        self.validate.get_or_insert(validate);
        self.parse.get_or_insert(parse);
        self
    }
}
