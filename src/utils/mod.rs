#[cfg(test)]
pub mod temp_dir;
