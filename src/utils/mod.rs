#[cfg(all(test, not(loom)))]
mod macros;
mod models;

#[cfg(all(test, not(loom)))]
pub(crate) use self::macros::each_capacity;
pub(crate) use self::models::alloc;
pub(crate) use self::models::sync;
