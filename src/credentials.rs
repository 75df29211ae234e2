//! Wi-Fi credential store.
//!
//! A fixed collection of five slots, persisted as one postcard block at a
//! fixed logical storage index. Slots are allocated in order and never
//! individually deleted; once all five hold other SSIDs, new networks are
//! dropped (logged) rather than evicting an old one.
//!
//! ```text
//!  slot:      0        1        2        3        4
//!          ┌───────┬────────┬────────┬────────┬────────┐
//!          │ home ✓│ cafe ✗ │ office✗│ (free) │ (free) │
//!          └───────┴────────┴────────┴────────┴────────┘
//!  next_retry_candidate(): cafe → office → cafe → ...  (wraps 4 → 0)
//! ```

use heapless::String;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::{CredentialError, Error};

/// Number of slots.
pub const SLOT_COUNT: usize = 5;

/// Maximum SSID length in bytes.
pub const SSID_CAPACITY: usize = 20;

/// Maximum password length in bytes.
pub const PASSWORD_CAPACITY: usize = 20;

/// Logical persistence index of the credential block.
pub const CREDENTIALS_INDEX: u16 = 0;

/// Upper bound of the encoded block.
const BLOCK_CAPACITY: usize = 256;

const SSID_PREFIX: &str = "ssid:";
const PASSWORD_SEPARATOR: &str = ",pwd:";

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A validated SSID/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredential {
    pub ssid: String<SSID_CAPACITY>,
    pub password: String<PASSWORD_CAPACITY>,
}

fn check_field(value: &str) -> Result<(), CredentialError> {
    if !value.bytes().all(|b| (0x20..=0x7E).contains(&b)) || value.contains(", ") {
        return Err(CredentialError::InvalidCharacters);
    }
    Ok(())
}

impl WifiCredential {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        if ssid.is_empty() {
            return Err(CredentialError::EmptySsid);
        }
        check_field(ssid)?;
        check_field(password)?;
        // The join argument is "ssid,pwd", so the SSID must not contain a comma.
        if ssid.contains(',') {
            return Err(CredentialError::InvalidCharacters);
        }
        let mut s = String::new();
        s.push_str(ssid).map_err(|()| CredentialError::SsidTooLong)?;
        let mut p = String::new();
        p.push_str(password)
            .map_err(|()| CredentialError::PasswordTooLong)?;
        Ok(Self {
            ssid: s,
            password: p,
        })
    }

    /// Parse a peer message of the form `ssid:<ssid>,pwd:<password>`.
    pub fn parse_command(text: &str) -> Result<Self, CredentialError> {
        let rest = text
            .strip_prefix(SSID_PREFIX)
            .ok_or(CredentialError::Malformed)?;
        let (ssid, password) = rest
            .split_once(PASSWORD_SEPARATOR)
            .ok_or(CredentialError::Malformed)?;
        Self::new(ssid, password)
    }

    /// Argument for the access-point join command: `ssid,pwd`.
    pub fn join_argument(&self) -> String<{ SSID_CAPACITY + PASSWORD_CAPACITY + 1 }> {
        let mut out = String::new();
        // Capacity is the sum of both fields plus the comma.
        out.push_str(&self.ssid).ok();
        out.push(',').ok();
        out.push_str(&self.password).ok();
        out
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// One persisted credential record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSlot {
    pub ssid: String<SSID_CAPACITY>,
    pub password: String<PASSWORD_CAPACITY>,
    pub last_connect_succeeded: bool,
    pub is_populated: bool,
}

impl CredentialSlot {
    pub fn credential(&self) -> Option<WifiCredential> {
        self.is_populated.then(|| WifiCredential {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
        })
    }
}

/// The five-slot credential collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    slots: [CredentialSlot; SLOT_COUNT],
    /// Slot after the one most recently returned by `next_retry_candidate`.
    retry_cursor: usize,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[CredentialSlot; SLOT_COUNT] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&CredentialSlot> {
        self.slots.get(index).filter(|s| s.is_populated)
    }

    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| s.is_populated).count()
    }

    /// Index of the slot holding `ssid`.
    pub fn find(&self, ssid: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_populated && s.ssid.as_str() == ssid)
    }

    /// Slot already holding `ssid`, else the first free slot, else `None`
    /// (capacity exhausted).
    pub fn find_or_allocate_slot(&self, ssid: &str) -> Option<usize> {
        self.find(ssid)
            .or_else(|| self.slots.iter().position(|s| !s.is_populated))
    }

    /// Store `cred`, updating in place if its SSID is already known.
    pub fn store(&mut self, cred: &WifiCredential, succeeded: bool) -> Result<usize, CredentialError> {
        let Some(index) = self.find_or_allocate_slot(&cred.ssid) else {
            warn!("CRED: store full, dropping credentials for '{}'", cred.ssid);
            return Err(CredentialError::StoreFull);
        };
        let slot = &mut self.slots[index];
        slot.ssid = cred.ssid.clone();
        slot.password = cred.password.clone();
        slot.last_connect_succeeded = succeeded;
        slot.is_populated = true;
        info!("CRED: slot {index} <- '{}' (ok={succeeded})", cred.ssid);
        Ok(index)
    }

    /// Record the outcome of a connection attempt with slot `index`.
    pub fn record_connect_result(&mut self, index: usize, succeeded: bool) {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_populated => slot.last_connect_succeeded = succeeded,
            _ => warn!("CRED: connect result for empty slot {index} ignored"),
        }
    }

    /// First populated slot whose last connection succeeded.
    pub fn last_known_good(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_populated && s.last_connect_succeeded)
    }

    /// Next populated slot whose last attempt failed, round-robin from the
    /// previous candidate and wrapping from the last slot back to slot 0.
    pub fn next_retry_candidate(&mut self) -> Option<usize> {
        for step in 0..SLOT_COUNT {
            let index = (self.retry_cursor + step) % SLOT_COUNT;
            let slot = &self.slots[index];
            if slot.is_populated && !slot.last_connect_succeeded {
                self.retry_cursor = (index + 1) % SLOT_COUNT;
                return Some(index);
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load the block; a missing block yields an empty store.
    pub fn load(storage: &impl StoragePort) -> Result<Self, Error> {
        if !storage.exists(CREDENTIALS_INDEX) {
            info!("CRED: no stored block, starting empty");
            return Ok(Self::new());
        }
        let mut buf = [0u8; BLOCK_CAPACITY];
        let n = match storage.read(CREDENTIALS_INDEX, &mut buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => return Ok(Self::new()),
            Err(_) => return Err(Error::Storage("credential block read failed")),
        };
        let slots: [CredentialSlot; SLOT_COUNT] =
            postcard::from_bytes(&buf[..n]).map_err(|_| CredentialError::Encoding)?;
        let store = Self {
            slots,
            retry_cursor: 0,
        };
        info!("CRED: loaded {} populated slot(s)", store.populated());
        Ok(store)
    }

    /// Write the whole collection as one block.
    pub fn persist(&self, storage: &mut impl StoragePort) -> Result<(), Error> {
        let mut buf = [0u8; BLOCK_CAPACITY];
        let encoded =
            postcard::to_slice(&self.slots, &mut buf).map_err(|_| CredentialError::Encoding)?;
        storage
            .write(CREDENTIALS_INDEX, encoded)
            .map_err(|_| Error::Storage("credential block write failed"))
    }
}
