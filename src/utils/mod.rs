pub mod paths;

#[cfg(test)]
pub mod test_helpers;
