pub mod live;
pub mod memory;
pub mod store;
pub mod supabase;
pub mod supabase_store;

pub use live::{decode_all, LiveCollection};
pub use memory::MemoryStore;
pub use store::*;
pub use supabase_store::SupabaseStore;
