//! Loading checks from compiled contract artifacts.

use crate::{CheckConfig, CheckDefinition, HarnessError, Result};
use alloy_dyn_abi::{DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{Function, JsonAbi, Param};
use alloy_primitives::Bytes;
use serde::Deserialize;
use std::path::Path;

/// The parts of a Foundry or Hardhat artifact the harness needs.
#[derive(Deserialize)]
struct Artifact {
    abi: JsonAbi,
    bytecode: Bytecode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Bytecode {
    /// Foundry: `"bytecode": {"object": "0x..."}`
    Object { object: Bytes },
    /// Hardhat: `"bytecode": "0x..."`
    Raw(Bytes),
}

impl Bytecode {
    fn into_bytes(self) -> Bytes {
        match self {
            Self::Object { object } => object,
            Self::Raw(bytes) => bytes,
        }
    }
}

/// Builds a [`CheckDefinition`] from its configuration.
///
/// The artifact path is resolved against `root`. Constructor arguments are coerced from strings
/// using the artifact's ABI and appended to the creation code.
pub fn load_check(config: &CheckConfig, root: &Path) -> Result<CheckDefinition> {
    let path = root.join(&config.artifact);
    let content = std::fs::read_to_string(&path)
        .map_err(|source| HarnessError::ArtifactIo { path: path.clone(), source })?;
    let artifact: Artifact = serde_json::from_str(&content)
        .map_err(|source| HarnessError::ArtifactFormat { path: path.clone(), source })?;

    let mut init_code = artifact.bytecode.into_bytes().to_vec();
    if init_code.is_empty() {
        return Err(HarnessError::invalid_check(&config.name, "artifact has no creation code"));
    }

    match &artifact.abi.constructor {
        Some(constructor) => {
            let values = coerce_args(&config.name, &constructor.inputs, &config.args)?;
            init_code.extend(constructor.abi_encode_input(&values)?);
        }
        None if !config.args.is_empty() => {
            return Err(HarnessError::invalid_check(
                &config.name,
                "constructor arguments given but the artifact has no constructor",
            ));
        }
        None => {}
    }

    trace!(target: "runner", name = %config.name, path = %path.display(), len = init_code.len(), "loaded artifact");
    Ok(CheckDefinition {
        name: config.name.clone(),
        init_code: init_code.into(),
        priming: config.priming.clone(),
    })
}

/// ABI-encodes a call to the human-readable `signature`, e.g. `transfer(address,uint256)`, with
/// string-encoded `args`.
pub fn encode_call(signature: &str, args: &[String]) -> Result<Bytes> {
    let function = Function::parse(signature)
        .map_err(|err| HarnessError::invalid_check(signature, err))?;
    let values = coerce_args(signature, &function.inputs, args)?;
    Ok(function.abi_encode_input(&values)?.into())
}

fn coerce_args(name: &str, inputs: &[Param], args: &[String]) -> Result<Vec<DynSolValue>> {
    if inputs.len() != args.len() {
        return Err(HarnessError::invalid_check(
            name,
            format!("expected {} arguments, got {}", inputs.len(), args.len()),
        ));
    }
    inputs
        .iter()
        .zip(args)
        .map(|(input, arg)| Ok(input.resolve()?.coerce_str(arg)?))
        .collect()
}
