//! Wire data model for the cairn advertisement chain.
//!
//! The chain is a singly-linked list of signed [`Advertisement`] records,
//! each carrying a link to a chain of [`EntryChunk`] blocks holding the
//! announced multihashes. Blocks are IPLD records encoded as DAG-JSON or
//! DAG-CBOR ([`LinkCodec`]) and addressed by CIDv1/sha2-256.
//!
//! Consumers fetch the chain head through a [`SignedHead`] envelope, which
//! carries the head CID plus an ed25519 signature by the provider.

mod ad;
mod codec;
mod error;
mod head;
mod ids;

pub use ad::{Advertisement, EntryChunk, no_entries};
pub use codec::LinkCodec;
pub use error::SchemaError;
pub use head::SignedHead;
pub use ids::{Multihash, ProviderId};

pub use ipld_core::cid::Cid;
