// Service exports
pub mod appwrite;
pub mod auth;
pub mod cache;
pub mod memory;
pub mod store;

pub use appwrite::{AppwriteCollections, AppwriteStore};
pub use auth::{bearer_token, AuthError, CallerIdentity, IdentityVerifier, JwtVerifier};
pub use cache::{CacheError, CacheKey, CacheManager};
pub use memory::InMemoryStore;
pub use store::{StoreError, UserStore};
