//! Event schema extraction from standard contract ABI JSON.
//!
//! This is the bridge between the ABI documents emitted by Solidity
//! toolchains and the `EventSchema` entries the decoder and registry work
//! with. Tuple params are resolved recursively from their `components`.

use alloy_json_abi::{Event, EventParam as AbiEventParam, JsonAbi, Param};
use chainevents_core::{
    error::RegistryError,
    schema::{EventParam, EventSchema},
    types::ParamType,
};

/// Parse a contract ABI JSON document and return a schema for every event
/// it declares, in ABI order.
pub fn abi_events(json: &str) -> Result<Vec<EventSchema>, RegistryError> {
    let abi: JsonAbi = serde_json::from_str(json)?;
    abi.events().map(event_schema).collect()
}

/// Convert one ABI event item into an `EventSchema`.
pub fn event_schema(event: &Event) -> Result<EventSchema, RegistryError> {
    let inputs = event
        .inputs
        .iter()
        .map(|p| {
            Ok(EventParam {
                name: p.name.clone(),
                ty: resolve_event_param(p)?,
                indexed: p.indexed,
            })
        })
        .collect::<Result<Vec<_>, RegistryError>>()?;

    Ok(EventSchema {
        name: event.name.clone(),
        anonymous: event.anonymous,
        inputs,
    })
}

fn resolve_event_param(param: &AbiEventParam) -> Result<ParamType, RegistryError> {
    resolve(&param.ty, &param.components)
}

fn resolve_component(param: &Param) -> Result<ParamType, RegistryError> {
    resolve(&param.ty, &param.components)
}

/// Resolve an ABI `type` string, consulting `components` for tuples.
/// Handles array suffixes on tuples ("tuple[]", "tuple[2][]").
fn resolve(ty: &str, components: &[Param]) -> Result<ParamType, RegistryError> {
    if let Some(suffix) = ty.strip_prefix("tuple") {
        let elems = components
            .iter()
            .map(resolve_component)
            .collect::<Result<Vec<_>, _>>()?;
        return apply_array_suffix(ParamType::Tuple(elems), suffix, ty);
    }
    ty.parse()
        .map_err(|_| RegistryError::InvalidType(ty.to_string()))
}

fn apply_array_suffix(
    base: ParamType,
    suffix: &str,
    full_ty: &str,
) -> Result<ParamType, RegistryError> {
    let mut ty = base;
    let mut rest = suffix;
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|i| (&r[..i], &r[i + 1..])));
        let Some((len_str, tail)) = inner else {
            return Err(RegistryError::InvalidType(full_ty.to_string()));
        };
        ty = if len_str.is_empty() {
            ParamType::Array(Box::new(ty))
        } else {
            let len: u64 = len_str
                .parse()
                .map_err(|_| RegistryError::InvalidType(full_ty.to_string()))?;
            ParamType::FixedArray {
                elem: Box::new(ty),
                len,
            }
        };
        rest = tail;
    }
    Ok(ty)
}
