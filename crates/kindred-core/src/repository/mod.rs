//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (kindred-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod asset;
pub mod catalog;
pub mod character;
pub mod conversation;
pub mod interaction;
pub mod memory;

use crate::service::fs::FileSystem;

use self::asset::AssetRepository;
use self::catalog::{PersonalityRepository, RoleRepository};
use self::character::CharacterRepository;
use self::conversation::ConversationRepository;
use self::interaction::{InteractionRepository, MediaRepository};
use self::memory::MemoryRepository;

/// A complete storage backend: one repository per table family plus the
/// filesystem used for media files.
///
/// Services are generic over a single `B: Backend` and share it through an
/// `Arc<B>`, so adding a repository never touches every service signature.
pub trait Backend: Send + Sync + 'static {
    type Characters: CharacterRepository;
    type Personalities: PersonalityRepository;
    type Roles: RoleRepository;
    type Conversations: ConversationRepository;
    type Interactions: InteractionRepository;
    type Media: MediaRepository;
    type Memories: MemoryRepository;
    type Assets: AssetRepository;
    type Files: FileSystem;

    fn characters(&self) -> &Self::Characters;
    fn personalities(&self) -> &Self::Personalities;
    fn roles(&self) -> &Self::Roles;
    fn conversations(&self) -> &Self::Conversations;
    fn interactions(&self) -> &Self::Interactions;
    fn media(&self) -> &Self::Media;
    fn memories(&self) -> &Self::Memories;
    fn assets(&self) -> &Self::Assets;
    fn files(&self) -> &Self::Files;
}
