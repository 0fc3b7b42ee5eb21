// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod directory;
pub mod facebook;
pub mod google;
pub mod tickets;

pub use directory::{DirectoryService, ProfileEdit};
pub use facebook::{FacebookClient, FacebookProfile};
pub use google::{GoogleVerifier, PersonEnrichment};
pub use tickets::TicketStore;
