use std::{fmt, str::FromStr};

use {
    carlink_common::{ParticipantId, Tag},
    serde::{Deserialize, Serialize},
};

use crate::{Error, resolver::ExternalPlate};

/// Where a registry record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Written by registration.
    #[default]
    Local,
    /// Backfilled from the external resolver; never carries an identity until
    /// the owner registers.
    External,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::External => "external",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "external" => Ok(Self::External),
            other => Err(Error::message(format!("unknown provenance: {other}"))),
        }
    }
}

/// One plate and what we know about its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Platform identity of the owner. `None` means we cannot message them.
    pub identity: Option<ParticipantId>,
    pub tag: Tag,
    /// Owner agreed to have their handle shown to people who find them.
    pub allow_direct: bool,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub verified: bool,
    pub provenance: Provenance,
}

impl RegistryRecord {
    /// A completed local registration.
    pub fn local(
        identity: ParticipantId,
        tag: Tag,
        phone: Option<String>,
        display_name: Option<String>,
        allow_direct: bool,
    ) -> Self {
        Self {
            identity: Some(identity),
            tag,
            allow_direct,
            display_name,
            phone,
            verified: true,
            provenance: Provenance::Local,
        }
    }

    /// A record backfilled from the external resolver.
    pub fn external(tag: Tag, plate: ExternalPlate) -> Self {
        Self {
            identity: None,
            tag,
            allow_direct: plate.allow_direct,
            display_name: plate.display_name,
            phone: plate.phone,
            verified: false,
            provenance: Provenance::External,
        }
    }
}

/// Partial update applied by [`crate::RegistryStore::update`]. `None` fields
/// are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub identity: Option<ParticipantId>,
    pub allow_direct: Option<bool>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub verified: Option<bool>,
    pub provenance: Option<Provenance>,
}

impl RecordPatch {
    /// Patch that hands an identity-less record over to a registering owner.
    pub fn claim(record: &RegistryRecord) -> Self {
        Self {
            identity: record.identity,
            allow_direct: Some(record.allow_direct),
            display_name: record.display_name.clone(),
            phone: record.phone.clone(),
            verified: Some(record.verified),
            provenance: Some(record.provenance),
        }
    }

    pub fn apply(&self, record: &mut RegistryRecord) {
        if let Some(identity) = self.identity {
            record.identity = Some(identity);
        }
        if let Some(allow_direct) = self.allow_direct {
            record.allow_direct = allow_direct;
        }
        if let Some(ref name) = self.display_name {
            record.display_name = Some(name.clone());
        }
        if let Some(ref phone) = self.phone {
            record.phone = Some(phone.clone());
        }
        if let Some(verified) = self.verified {
            record.verified = verified;
        }
        if let Some(provenance) = self.provenance {
            record.provenance = provenance;
        }
    }
}
