pub mod fmt;
#[cfg(test)]
pub(crate) mod test_utils;
