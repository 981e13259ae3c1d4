pub mod blocks;
pub mod indexer;
pub mod uptime;

#[cfg(test)]
pub mod testing;
