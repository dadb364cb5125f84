//! Zone registry: logical zone names to physical addresses

use std::collections::HashMap;

use crate::config::{LightingConfig, ZoneConfig};

/// Physical address of a zone on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneAddress {
    pub strip: u8,
    pub zone: u8,
}

/// Lookup table from zone name to address
///
/// Addresses are positional: a zone's index within its strip is its
/// address even when earlier zones are unnamed.
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: HashMap<String, ZoneAddress>,
}

impl ZoneRegistry {
    /// Build the registry from a lighting configuration
    pub fn build(config: &LightingConfig) -> Self {
        let mut zones = HashMap::new();

        for (address, zone) in addressed_zones(config) {
            if zone.name.is_empty() {
                continue;
            }
            if let Some(previous) = zones.insert(zone.name.clone(), address) {
                log::warn!(
                    "Zone '{}' defined twice ({:?} and {:?}), using the later one",
                    zone.name,
                    previous,
                    address
                );
            }
        }

        Self { zones }
    }

    /// Address of a named zone
    pub fn lookup(&self, name: &str) -> Option<ZoneAddress> {
        self.zones.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Every zone of the configuration paired with its positional address.
///
/// Zones whose strip or zone index does not fit in a byte cannot be
/// addressed and are skipped with a warning.
pub(crate) fn addressed_zones(
    config: &LightingConfig,
) -> impl Iterator<Item = (ZoneAddress, &ZoneConfig)> {
    config
        .strips
        .iter()
        .enumerate()
        .flat_map(|(strip_index, strip)| {
            strip
                .zones
                .iter()
                .enumerate()
                .map(move |(zone_index, zone)| (strip_index, zone_index, zone))
        })
        .filter_map(|(strip_index, zone_index, zone)| {
            match (u8::try_from(strip_index), u8::try_from(zone_index)) {
                (Ok(strip), Ok(zone_idx)) => Some((ZoneAddress { strip, zone: zone_idx }, zone)),
                _ => {
                    log::warn!(
                        "Zone '{}' at strip {} zone {} is out of addressable range",
                        zone.name,
                        strip_index,
                        zone_index
                    );
                    None
                }
            }
        })
}
