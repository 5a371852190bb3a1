use crate::error::Error;
use crate::model::SaveFile;
use std::borrow::Cow;

/// Byte conversion from the source layout to the device layout.
pub trait SaveTransform: Send + Sync {
    fn name(&self) -> &str;

    fn transform<'a>(&self, save: &SaveFile, input: &'a [u8]) -> Result<Cow<'a, [u8]>, Error>;
}

/// Both layouts store the raw VMU image, so the bytes are copied as they are.
pub struct Passthrough;

impl SaveTransform for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn transform<'a>(&self, _save: &SaveFile, input: &'a [u8]) -> Result<Cow<'a, [u8]>, Error> {
        Ok(Cow::Borrowed(input))
    }
}
