use crate::error::ValidationError;
use crate::options::Options;
use serde_json::Value;
use spine_types::Attributes;

/// Optional behavior a record schema plugs in.
///
/// Most schemas do not need this; the defaults accept everything and pass
/// server data through untouched.
pub trait RecordHooks {
    /// Checks the attributes a record would hold after a change.
    /// Return `Err` to reject the change.
    fn validate(&self, attrs: &Attributes, options: &Options) -> Result<(), ValidationError> {
        let _ = (attrs, options);
        Ok(())
    }

    /// Converts server data into attributes before they are applied.
    fn parse(&self, response: Value, options: &Options) -> Value {
        let _ = options;
        response
    }
}

/// The default hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl RecordHooks for NoHooks {}

/// Hooks made from a validation closure.
pub struct Validator<F>(pub F);

impl<F> RecordHooks for Validator<F>
where
    F: Fn(&Attributes) -> Result<(), ValidationError>,
{
    fn validate(&self, attrs: &Attributes, _: &Options) -> Result<(), ValidationError> {
        (self.0)(attrs)
    }
}
