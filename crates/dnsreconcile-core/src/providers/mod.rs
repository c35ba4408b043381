// # Built-in Providers
//
// Providers that ship with the core library. Real provider APIs live in
// their own crates (e.g. `dnsreconcile-provider-desec`).

pub mod memory;

pub use memory::{MemoryProvider, MemoryProviderFactory};
