use std::collections::HashMap;

use failure::Fail;
use log::debug;
use serde::{Deserialize, Serialize};

use macaddress::{generate, AddressError, MacAddr, Prefix};

pub const RESOURCE_TYPE_NAME: &str = "macaddress";

#[derive(Debug, Fail)]
pub enum ProviderError {
    #[fail(display = "{}", _0)]
    Address(#[fail(cause)] AddressError),
    #[fail(display = "no resource named {:?} is registered", _0)]
    UnknownResourceType(String),
    #[fail(display = "no {} instance exists in state", _0)]
    NoInstance(&'static str),
}

impl From<AddressError> for ProviderError {
    fn from(err: AddressError) -> ProviderError {
        ProviderError::Address(err)
    }
}

/// Creation-time configuration. The prefix is the only recognized
/// option and is fixed for the lifetime of the instance.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ResourceConfig {
    #[serde(default = "Default::default")]
    pub prefix: Vec<i64>,
}

/// One tracked address. The canonical string form doubles as the
/// identity token, so `id` and `address` always agree.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ResourceState {
    pub id: String,
    pub address: String,
    #[serde(default = "Default::default")]
    pub prefix: Vec<i64>,
}

pub fn create(config: &ResourceConfig) -> Result<ResourceState, ProviderError> {
    let prefix = Prefix::from_values(&config.prefix)?;
    let addr = generate(&prefix)?;
    let address = addr.to_string();
    debug!("generated address {}", address);
    Ok(ResourceState {
        id: address.clone(),
        address,
        prefix: config.prefix.clone(),
    })
}

/// The address is immutable once created, so refresh never recomputes
/// anything and never reports drift.
pub fn read(state: &ResourceState) -> Result<ResourceState, ProviderError> {
    Ok(state.clone())
}

/// Forgetting the state is the whole of deletion. A mac address is not
/// a leasable external resource, so there is nothing to tear down.
pub fn delete(state: ResourceState) -> Result<(), ProviderError> {
    drop(state);
    Ok(())
}

/// Adopts an externally assigned address. The input is parsed
/// leniently, and the re-derived canonical form becomes the identity.
/// Adoption never infers a prefix, so the prefix is left empty.
pub fn import(address: &str) -> Result<ResourceState, ProviderError> {
    let addr: MacAddr = address.parse().map_err(ProviderError::Address)?;
    let canonical = addr.to_string();
    debug!("adopted address {:?} as {}", address, canonical);
    Ok(ResourceState {
        id: canonical.clone(),
        address: canonical,
        prefix: Vec::new(),
    })
}

/// The prefix is fixed at creation. Any change destroys the instance
/// and creates a fresh one; there is no in-place update.
pub fn requires_replacement(state: &ResourceState, config: &ResourceConfig) -> bool {
    state.prefix != config.prefix
}

/// Lifecycle entry points for one resource type. Plain function
/// references rather than trait objects: the dispatch set is closed and
/// the entity set has exactly one member.
pub struct Handlers {
    pub create: fn(&ResourceConfig) -> Result<ResourceState, ProviderError>,
    pub read: fn(&ResourceState) -> Result<ResourceState, ProviderError>,
    pub delete: fn(ResourceState) -> Result<(), ProviderError>,
    pub import: fn(&str) -> Result<ResourceState, ProviderError>,
}

/// Builds the resource-type map once at startup. Callers thread it
/// through explicitly; nothing here is process-global.
pub fn registry() -> HashMap<&'static str, Handlers> {
    let mut resources = HashMap::new();
    resources.insert(
        RESOURCE_TYPE_NAME,
        Handlers {
            create,
            read,
            delete,
            import,
        },
    );
    resources
}

pub fn lookup<'a>(
    resources: &'a HashMap<&'static str, Handlers>,
    type_name: &str,
) -> Result<&'a Handlers, ProviderError> {
    resources
        .get(type_name)
        .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
}

/// The four transitions of the address lifecycle.
#[derive(Clone, Debug)]
pub enum Transition {
    Create(ResourceConfig),
    Read,
    Delete,
    Import(String),
}

impl Transition {
    /// Applies one lifecycle step to the (at most one) tracked
    /// instance. A failing step leaves no partially-created instance:
    /// the error propagates and no new state is returned.
    pub fn apply(
        &self,
        handlers: &Handlers,
        state: Option<ResourceState>,
    ) -> Result<Option<ResourceState>, ProviderError> {
        match self {
            Transition::Create(config) => {
                if let Some(existing) = state {
                    if !requires_replacement(&existing, config) {
                        return Ok(Some(existing));
                    }
                    debug!("prefix changed, replacing {}", existing.address);
                    (handlers.delete)(existing)?;
                }
                (handlers.create)(config).map(Some)
            }
            Transition::Read => match state {
                Some(existing) => (handlers.read)(&existing).map(Some),
                None => Ok(None),
            },
            Transition::Delete => {
                if let Some(existing) = state {
                    (handlers.delete)(existing)?;
                }
                Ok(None)
            }
            Transition::Import(address) => (handlers.import)(address).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        create, import, read, registry, lookup, requires_replacement, ProviderError,
        ResourceConfig, ResourceState, Transition,
    };
    use macaddress::{AddressError, MacAddr};

    #[test]
    fn create_yields_local_unicast_identity() {
        let state = create(&ResourceConfig::default()).unwrap();
        assert_eq!(state.id, state.address);
        assert!(state.prefix.is_empty());

        let addr: MacAddr = state.address.parse().unwrap();
        assert!(!addr.is_multicast());
        assert!(addr.is_locally_administered());
    }

    #[test]
    fn create_honors_prefix() {
        let config = ResourceConfig {
            prefix: vec![0x10, 0xfe, 0x55],
        };
        let state = create(&config).unwrap();
        assert!(state.address.starts_with("10:fe:55:"));
        assert_eq!(state.prefix, config.prefix);
    }

    #[test]
    fn create_rejects_bad_prefixes() {
        let overlong = ResourceConfig { prefix: vec![0; 7] };
        assert!(matches!(
            create(&overlong),
            Err(ProviderError::Address(AddressError::PrefixTooLong(7)))
        ));

        let out_of_range = ResourceConfig { prefix: vec![300] };
        assert!(matches!(
            create(&out_of_range),
            Err(ProviderError::Address(AddressError::PrefixByteOutOfRange(300)))
        ));
    }

    #[test]
    fn read_reports_no_drift() {
        let state = create(&ResourceConfig::default()).unwrap();
        assert_eq!(read(&state).unwrap(), state);
    }

    #[test]
    fn import_keeps_given_value() {
        let state = import("02:00:00:00:00:01").unwrap();
        assert_eq!(state.id, "02:00:00:00:00:01");
        assert_eq!(state.address, state.id);
        assert!(state.prefix.is_empty());
    }

    #[test]
    fn import_normalizes_case_and_width() {
        let state = import("AA:B:0:1:2:3").unwrap();
        assert_eq!(state.id, "aa:0b:00:01:02:03");
    }

    #[test]
    fn import_rejects_malformed_strings() {
        for input in &["not-a-mac", "aa:bb:cc:dd:ee", "zz:00:00:00:00:00"] {
            assert!(matches!(
                import(input),
                Err(ProviderError::Address(AddressError::MalformedAddress(_)))
            ));
        }
    }

    #[test]
    fn prefix_change_forces_replacement() {
        let config = ResourceConfig {
            prefix: vec![0x02, 0x11],
        };
        let state = create(&config).unwrap();
        assert!(!requires_replacement(&state, &config));

        let changed = ResourceConfig {
            prefix: vec![0x02, 0x22],
        };
        assert!(requires_replacement(&state, &changed));

        let imported = import("02:00:00:00:00:01").unwrap();
        assert!(requires_replacement(&imported, &config));
    }

    #[test]
    fn registry_dispatch_full_pass() {
        let resources = registry();
        let handlers = lookup(&resources, "macaddress").unwrap();

        let state = Transition::Create(ResourceConfig::default())
            .apply(handlers, None)
            .unwrap();
        let id = state.as_ref().unwrap().id.clone();

        let state = Transition::Read.apply(handlers, state).unwrap();
        assert_eq!(state.as_ref().unwrap().id, id);

        let state = Transition::Delete.apply(handlers, state).unwrap();
        assert!(state.is_none());
    }

    #[test]
    fn unknown_resource_type_is_an_error() {
        let resources = registry();
        assert!(matches!(
            lookup(&resources, "tls_certificate"),
            Err(ProviderError::UnknownResourceType(_))
        ));
    }

    #[test]
    fn create_transition_replaces_only_on_prefix_change() {
        let resources = registry();
        let handlers = lookup(&resources, "macaddress").unwrap();

        let config = ResourceConfig {
            prefix: vec![0x02, 0x11],
        };
        let state = Transition::Create(config.clone())
            .apply(handlers, None)
            .unwrap();

        let unchanged = Transition::Create(config)
            .apply(handlers, state.clone())
            .unwrap();
        assert_eq!(unchanged, state);

        let replaced = Transition::Create(ResourceConfig {
            prefix: vec![0x02, 0x22],
        })
        .apply(handlers, state)
        .unwrap()
        .unwrap();
        assert!(replaced.address.starts_with("02:22:"));
    }

    #[test]
    fn state_model_serde_round_trip() {
        let state = ResourceState {
            id: "02:11:aa:bb:cc:dd".to_string(),
            address: "02:11:aa:bb:cc:dd".to_string(),
            prefix: vec![0x02, 0x11],
        };
        let encoded = serde_json::to_string(&state).unwrap();
        assert_eq!(
            serde_json::from_str::<ResourceState>(&encoded).unwrap(),
            state
        );
    }
}
