//! Process-wide table of the protobuf types this service encodes or decodes.
//!
//! Every `Any` that crosses the node boundary is looked up here by its type
//! URL. The table is built once on first use and never mutated afterwards.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64STD, Engine};
use cosmrs::proto::cosmos::{
    auth::v1beta1::BaseAccount,
    bank::v1beta1::MsgSend,
    crypto::secp256k1::PubKey,
    vesting::v1beta1::{ContinuousVestingAccount, DelayedVestingAccount},
};
use cosmrs::Any;
use lazy_static::lazy_static;
use prost::Message;
use serde_json::{json, Value};
use thiserror::Error;

use crate::blockchain::models::AccountState;

pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const SECP256K1_PUB_KEY: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const BASE_ACCOUNT: &str = "/cosmos.auth.v1beta1.BaseAccount";
pub const CONTINUOUS_VESTING_ACCOUNT: &str = "/cosmos.vesting.v1beta1.ContinuousVestingAccount";
pub const DELAYED_VESTING_ACCOUNT: &str = "/cosmos.vesting.v1beta1.DelayedVestingAccount";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("type {0} is not registered")]
    Unregistered(String),
    #[error("failed to decode {type_url}: {source}")]
    Decode {
        type_url: String,
        #[source]
        source: prost::DecodeError,
    },
    #[error("type {0} is not an account type")]
    NotAnAccount(String),
    #[error("account of type {0} carries no base account")]
    MissingBaseAccount(String),
}

type DescribeFn = fn(&[u8]) -> Result<Value, prost::DecodeError>;
type AccountFn = fn(&[u8]) -> Result<Option<BaseAccount>, prost::DecodeError>;

struct TypeEntry {
    describe: DescribeFn,
    account: Option<AccountFn>,
}

pub struct TypeRegistry {
    entries: HashMap<&'static str, TypeEntry>,
}

lazy_static! {
    static ref REGISTRY: TypeRegistry = TypeRegistry::new();
}

impl TypeRegistry {
    fn new() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register(MSG_SEND, describe_msg_send, None);
        registry.register(SECP256K1_PUB_KEY, describe_pub_key, None);
        registry.register(BASE_ACCOUNT, describe_base_account, Some(base_account));
        registry.register(
            CONTINUOUS_VESTING_ACCOUNT,
            describe_continuous_vesting,
            Some(continuous_vesting_base),
        );
        registry.register(
            DELAYED_VESTING_ACCOUNT,
            describe_delayed_vesting,
            Some(delayed_vesting_base),
        );
        registry
    }

    fn register(&mut self, type_url: &'static str, describe: DescribeFn, account: Option<AccountFn>) {
        self.entries.insert(type_url, TypeEntry { describe, account });
    }

    /// The shared registry.
    pub fn global() -> &'static TypeRegistry {
        &REGISTRY
    }

    pub fn contains(&self, type_url: &str) -> bool {
        self.entries.contains_key(type_url)
    }

    fn entry(&self, type_url: &str) -> Result<&TypeEntry, RegistryError> {
        self.entries
            .get(type_url)
            .ok_or_else(|| RegistryError::Unregistered(type_url.to_string()))
    }

    /// Renders a packed message as JSON for logs.
    pub fn describe(&self, any: &Any) -> Result<Value, RegistryError> {
        let entry = self.entry(&any.type_url)?;
        let mut value = (entry.describe)(&any.value).map_err(|source| RegistryError::Decode {
            type_url: any.type_url.clone(),
            source,
        })?;
        if let Value::Object(map) = &mut value {
            map.insert("@type".to_string(), Value::String(any.type_url.clone()));
        }
        Ok(value)
    }

    /// Like `describe`, but unknown types become an opaque placeholder and
    /// undecodable known types carry the decode error.
    pub fn describe_lossy(&self, any: &Any) -> Value {
        if !self.contains(&any.type_url) {
            return json!({
                "@type": any.type_url,
                "value": BASE64STD.encode(&any.value),
            });
        }
        self.describe(any).unwrap_or_else(|e| {
            json!({
                "@type": any.type_url,
                "value": BASE64STD.encode(&any.value),
                "error": e.to_string(),
            })
        })
    }

    /// Extracts account number and sequence from a packed account.
    pub fn decode_account(&self, any: &Any) -> Result<AccountState, RegistryError> {
        let entry = self.entry(&any.type_url)?;
        let extract = entry
            .account
            .ok_or_else(|| RegistryError::NotAnAccount(any.type_url.clone()))?;
        let base = extract(&any.value)
            .map_err(|source| RegistryError::Decode {
                type_url: any.type_url.clone(),
                source,
            })?
            .ok_or_else(|| RegistryError::MissingBaseAccount(any.type_url.clone()))?;

        let pub_key = match base.pub_key {
            Some(key) if key.type_url == SECP256K1_PUB_KEY => Some(
                PubKey::decode(key.value.as_slice())
                    .map_err(|source| RegistryError::Decode {
                        type_url: key.type_url.clone(),
                        source,
                    })?
                    .key,
            ),
            _ => None,
        };

        Ok(AccountState {
            address: base.address,
            account_number: base.account_number,
            sequence: base.sequence,
            pub_key,
        })
    }
}

fn describe_msg_send(bytes: &[u8]) -> Result<Value, prost::DecodeError> {
    let msg = MsgSend::decode(bytes)?;
    let amount: Vec<Value> = msg
        .amount
        .iter()
        .map(|coin| json!({ "denom": coin.denom, "amount": coin.amount }))
        .collect();
    Ok(json!({
        "from_address": msg.from_address,
        "to_address": msg.to_address,
        "amount": amount,
    }))
}

fn describe_pub_key(bytes: &[u8]) -> Result<Value, prost::DecodeError> {
    let key = PubKey::decode(bytes)?;
    Ok(json!({ "key": BASE64STD.encode(key.key) }))
}

fn describe_account(base: &BaseAccount) -> Value {
    json!({
        "address": base.address,
        "account_number": base.account_number.to_string(),
        "sequence": base.sequence.to_string(),
    })
}

fn describe_base_account(bytes: &[u8]) -> Result<Value, prost::DecodeError> {
    Ok(describe_account(&BaseAccount::decode(bytes)?))
}

fn describe_continuous_vesting(bytes: &[u8]) -> Result<Value, prost::DecodeError> {
    let base = continuous_vesting_base(bytes)?;
    Ok(json!({ "base_account": base.as_ref().map(describe_account) }))
}

fn describe_delayed_vesting(bytes: &[u8]) -> Result<Value, prost::DecodeError> {
    let base = delayed_vesting_base(bytes)?;
    Ok(json!({ "base_account": base.as_ref().map(describe_account) }))
}

fn base_account(bytes: &[u8]) -> Result<Option<BaseAccount>, prost::DecodeError> {
    BaseAccount::decode(bytes).map(Some)
}

fn continuous_vesting_base(bytes: &[u8]) -> Result<Option<BaseAccount>, prost::DecodeError> {
    let account = ContinuousVestingAccount::decode(bytes)?;
    Ok(account.base_vesting_account.and_then(|v| v.base_account))
}

fn delayed_vesting_base(bytes: &[u8]) -> Result<Option<BaseAccount>, prost::DecodeError> {
    let account = DelayedVestingAccount::decode(bytes)?;
    Ok(account.base_vesting_account.and_then(|v| v.base_account))
}
