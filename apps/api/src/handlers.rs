pub mod data;
pub mod health;
pub mod permissions;

#[cfg(test)]
mod test_support;
