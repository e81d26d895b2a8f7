// src/blockchain/services/transactions.rs

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD as BASE64STD;
use base64::Engine;
use cosmrs::bank::MsgSend;
use cosmrs::crypto::PublicKey;
use cosmrs::proto::cosmos::tx::v1beta1::TxRaw;
use cosmrs::tendermint::chain;
use cosmrs::tx::{Body, Fee, Msg, SignDoc, SignerInfo};
use cosmrs::{AccountId, Coin};
use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use prost::Message as _;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::blockchain::{
    client::ChainClient,
    models::{AccountState, ChainError, MakeTxRequest},
    registry::TypeRegistry,
};
use crate::keys::Keyring;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("invalid {field} address '{address}'")]
    InvalidAddress { field: &'static str, address: String },
    #[error("invalid chain id '{0}'")]
    InvalidChainId(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TxError {
    /// Errors caused by the request itself rather than the node or the key.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TxError::InvalidAddress { .. } | TxError::InvalidChainId(_))
    }
}

/// Sender/receiver resolved, account state fetched and key imported.
pub struct TransactionMaker {
    chain_id: chain::Id,
    sender: AccountId,
    receiver: AccountId,
    account: AccountState,
    keyring: Keyring,
}

/// Transfer body and fee, frozen before signing.
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    body: Body,
    fee: Fee,
    denom: String,
    fee_amount: u64,
    gas_limit: u64,
}

/// A fully signed single-signer transaction in `TxRaw` form.
#[derive(Debug, Clone)]
pub struct SignedTx {
    unsigned: UnsignedTx,
    public_key: PublicKey,
    sequence: u64,
    sign_bytes: Vec<u8>,
    signature: Vec<u8>,
    tx_bytes: Vec<u8>,
}

pub fn parse_address(field: &'static str, address: &str) -> Result<AccountId, TxError> {
    address.parse::<AccountId>().map_err(|_| TxError::InvalidAddress {
        field,
        address: address.to_string(),
    })
}

pub fn parse_chain_id(chain_id: &str) -> Result<chain::Id, TxError> {
    chain_id
        .parse::<chain::Id>()
        .map_err(|_| TxError::InvalidChainId(chain_id.to_string()))
}

impl TransactionMaker {
    /// Resolves both addresses, reads the sender's account state from the
    /// node and imports the sealed key into a fresh keyring.
    pub async fn new(
        client: &dyn ChainClient,
        node_address: &str,
        chain_id: &str,
        sender: &str,
        receiver: &str,
        passphrase: &str,
        private_key: &[u8],
    ) -> Result<Self, TxError> {
        let sender = parse_address("from", sender)?;
        let receiver = parse_address("to", receiver)?;
        let chain_id = parse_chain_id(chain_id)?;

        let account = client.account(node_address, &sender.to_string()).await?;
        debug!(
            "Account {} has number {} and sequence {}",
            sender, account.account_number, account.sequence
        );

        let keyring = Keyring::import(private_key, passphrase)?;
        let key_address = keyring.account_id(sender.prefix())?;
        if key_address != sender {
            return Err(anyhow!("key in keyring {} does not belong to {}", keyring.id(), sender).into());
        }

        Ok(Self {
            chain_id,
            sender,
            receiver,
            account,
            keyring,
        })
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    /// Assembles `MsgSend(sender, receiver, amount)` with fee, gas and memo.
    pub fn build_tx(
        &self,
        denom: &str,
        amount: u64,
        gas_limit: u64,
        fee_amount: u64,
        memo: &str,
    ) -> Result<UnsignedTx, TxError> {
        let msg = MsgSend {
            from_address: self.sender.clone(),
            to_address: self.receiver.clone(),
            amount: coins(amount, denom).context("invalid amount coin")?,
        };
        let any_msg = msg.to_any().map_err(|e| anyhow!("failed to encode MsgSend: {}", e))?;

        let fee = Fee {
            amount: coins(fee_amount, denom).context("invalid fee coin")?,
            gas_limit,
            payer: None,
            granter: None,
        };

        Ok(UnsignedTx {
            body: Body::new(vec![any_msg], memo, 0u32),
            fee,
            denom: denom.to_string(),
            fee_amount,
            gas_limit,
        })
    }

    /// Signs in SIGN_MODE_DIRECT with the current sequence and account number.
    /// Consumes the maker, so the keyring is dropped once the signature exists.
    pub fn sign_tx(self, unsigned: UnsignedTx) -> Result<SignedTx, TxError> {
        let public_key = self.keyring.public_key().clone();
        let sequence = self.account.sequence;

        let sign_doc = sign_doc(
            &unsigned,
            &public_key,
            &self.chain_id,
            self.account.account_number,
            sequence,
        )?;
        let body_bytes = sign_doc.body_bytes.clone();
        let auth_info_bytes = sign_doc.auth_info_bytes.clone();
        let sign_bytes = sign_doc
            .into_bytes()
            .map_err(|e| anyhow!("failed to encode sign doc: {}", e))?;

        let signature = self.keyring.sign(&sign_bytes);

        let tx_bytes = TxRaw {
            body_bytes,
            auth_info_bytes,
            signatures: vec![signature.clone()],
        }
        .encode_to_vec();

        Ok(SignedTx {
            unsigned,
            public_key,
            sequence,
            sign_bytes,
            signature,
            tx_bytes,
        })
    }
}

// Zero-valued coins are left out, so a zero fee is an empty fee list.
fn coins(amount: u64, denom: &str) -> anyhow::Result<Vec<Coin>> {
    let coin = Coin::new(amount as u128, denom).map_err(|e| anyhow!("{}", e))?;
    if amount == 0 {
        return Ok(Vec::new());
    }
    Ok(vec![coin])
}

fn sign_doc(
    unsigned: &UnsignedTx,
    public_key: &PublicKey,
    chain_id: &chain::Id,
    account_number: u64,
    sequence: u64,
) -> anyhow::Result<SignDoc> {
    let auth_info = SignerInfo::single_direct(Some(public_key.clone()), sequence).auth_info(unsigned.fee.clone());
    SignDoc::new(&unsigned.body, &auth_info, chain_id, account_number)
        .map_err(|e| anyhow!("signdoc error: {}", e))
}

impl UnsignedTx {
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn fee_amount(&self) -> u64 {
        self.fee_amount
    }

    pub fn denom(&self) -> &str {
        &self.denom
    }

    pub fn memo(&self) -> &str {
        &self.body.memo
    }
}

impl SignedTx {
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn sign_bytes(&self) -> &[u8] {
        &self.sign_bytes
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Hash the node will report: uppercase hex SHA-256 of the encoded tx.
    pub fn tx_hash(&self) -> String {
        hex::encode_upper(Sha256::digest(&self.tx_bytes))
    }

    /// Checks the attached signature against sign bytes rebuilt for the given
    /// chain, account number and sequence.
    pub fn verify(&self, chain_id: &chain::Id, account_number: u64, sequence: u64) -> anyhow::Result<()> {
        let sign_bytes = sign_doc(&self.unsigned, &self.public_key, chain_id, account_number, sequence)?
            .into_bytes()
            .map_err(|e| anyhow!("failed to encode sign doc: {}", e))?;

        let verifying_key = VerifyingKey::from_sec1_bytes(&self.public_key.to_bytes())
            .context("public key is not a secp256k1 key")?;
        let signature = Signature::from_slice(&self.signature).context("malformed signature")?;
        verifying_key
            .verify(&sign_bytes, &signature)
            .map_err(|_| anyhow!("signature does not match sign bytes"))
    }

    /// JSON rendering for debug logs.
    pub fn describe(&self) -> Value {
        let registry = TypeRegistry::global();
        let messages: Vec<Value> = self
            .unsigned
            .body
            .messages
            .iter()
            .map(|m| registry.describe_lossy(m))
            .collect();
        let fee_coins: Vec<Value> = self
            .unsigned
            .fee
            .amount
            .iter()
            .map(|c| json!({ "denom": c.denom.to_string(), "amount": c.amount.to_string() }))
            .collect();

        json!({
            "body": {
                "messages": messages,
                "memo": self.unsigned.body.memo,
            },
            "auth_info": {
                "signer_infos": [{
                    "public_key": BASE64STD.encode(self.public_key.to_bytes()),
                    "mode": "SIGN_MODE_DIRECT",
                    "sequence": self.sequence.to_string(),
                }],
                "fee": {
                    "amount": fee_coins,
                    "gas_limit": self.unsigned.gas_limit.to_string(),
                },
            },
            "signatures": [BASE64STD.encode(&self.signature)],
        })
    }
}

/// Submits the signed transaction and returns the hash reported by the node.
pub async fn broadcast_tx(client: &dyn ChainClient, node_address: &str, signed: &SignedTx) -> Result<String, TxError> {
    let result = client.broadcast(node_address, signed.tx_bytes()).await?;
    Ok(result.tx_hash)
}

/// Runs initialize, build, sign and broadcast for one transfer. No retries.
pub async fn make_transfer(
    client: &dyn ChainClient,
    denom: &str,
    request: &MakeTxRequest,
    private_key: &[u8],
) -> Result<String, TxError> {
    let maker = TransactionMaker::new(
        client,
        &request.node_address,
        &request.chain_id,
        &request.from,
        &request.to,
        request.passphrase.expose_secret(),
        private_key,
    )
    .await?;

    let unsigned = maker.build_tx(
        denom,
        request.amount,
        request.gas_limit,
        request.fee_amount,
        &request.memo,
    )?;

    let chain_id = maker.chain_id.clone();
    let account_number = maker.account().account_number;
    let signed = maker.sign_tx(unsigned)?;
    signed
        .verify(&chain_id, account_number, signed.sequence())
        .context("self-check of signature failed")?;

    debug!("tx details {}", signed.describe());
    info!(
        "Broadcasting tx {} from {} (sequence {})",
        signed.tx_hash(),
        request.from,
        signed.sequence()
    );

    broadcast_tx(client, &request.node_address, &signed).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blockchain::models::BroadcastResult;
    use crate::keys::encryption::seal_private_key;
    use async_trait::async_trait;
    use cosmrs::proto::cosmos::tx::v1beta1::SignDoc as ProtoSignDoc;
    use cosmrs::Tx;
    use secrecy::SecretString;
    use std::sync::Mutex;

    pub const SENDER_KEY: &str = "0101010101010101010101010101010101010101010101010101010101010101";
    pub const RECEIVER_KEY: &str = "0202020202020202020202020202020202020202020202020202020202020202";

    pub fn address_of(key_hex: &str) -> String {
        Keyring::from_hex(key_hex).unwrap().account_id("cosmos").unwrap().to_string()
    }

    /// Stub node with a fixed account state that records every broadcast.
    pub struct StubChain {
        pub account_number: u64,
        pub sequence: u64,
        pub code: u32,
        pub broadcasts: Mutex<Vec<Vec<u8>>>,
        pub queries: Mutex<Vec<String>>,
    }

    impl StubChain {
        pub fn new(account_number: u64, sequence: u64) -> Self {
            Self {
                account_number,
                sequence,
                code: 0,
                broadcasts: Mutex::new(Vec::new()),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChainClient for StubChain {
        async fn account(&self, _node_address: &str, address: &str) -> Result<AccountState, ChainError> {
            self.queries.lock().unwrap().push(address.to_string());
            Ok(AccountState {
                address: address.to_string(),
                account_number: self.account_number,
                sequence: self.sequence,
                pub_key: None,
            })
        }

        async fn broadcast(&self, _node_address: &str, tx_bytes: &[u8]) -> Result<BroadcastResult, ChainError> {
            self.broadcasts.lock().unwrap().push(tx_bytes.to_vec());
            BroadcastResult {
                tx_hash: "STUBHASH".to_string(),
                code: self.code,
                raw_log: "out of gas".to_string(),
            }
            .ensure_accepted("{}")
        }
    }

    fn request() -> MakeTxRequest {
        MakeTxRequest {
            node_address: "https://node.example".to_string(),
            from: address_of(SENDER_KEY),
            to: address_of(RECEIVER_KEY),
            chain_id: "test-1".to_string(),
            passphrase: SecretString::new("pw".to_string()),
            amount: 100,
            gas_limit: 200_000,
            fee_amount: 500,
            memo: String::new(),
        }
    }

    fn sealed_sender_key() -> Vec<u8> {
        seal_private_key(SENDER_KEY, "pw").unwrap().into_bytes()
    }

    async fn maker(chain: &StubChain) -> TransactionMaker {
        let req = request();
        TransactionMaker::new(chain, &req.node_address, "test-1", &req.from, &req.to, "pw", &sealed_sender_key())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn end_to_end_transfer_against_stub_chain() {
        let chain = StubChain::new(42, 5);
        let hash = make_transfer(&chain, "uatom", &request(), &sealed_sender_key()).await.unwrap();
        assert_eq!(hash, "STUBHASH");

        let broadcasts = chain.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        let tx = Tx::from_bytes(&broadcasts[0]).unwrap();

        assert_eq!(tx.body.messages.len(), 1);
        let msg = MsgSend::from_any(&tx.body.messages[0]).unwrap();
        assert_eq!(msg.from_address.to_string(), address_of(SENDER_KEY));
        assert_eq!(msg.to_address.to_string(), address_of(RECEIVER_KEY));
        assert_eq!(msg.amount[0].amount, 100);
        assert_eq!(msg.amount[0].denom.to_string(), "uatom");

        assert_eq!(tx.auth_info.fee.gas_limit, 200_000);
        assert_eq!(tx.auth_info.fee.amount[0].amount, 500);
        assert_eq!(tx.auth_info.signer_infos.len(), 1);
        assert_eq!(tx.auth_info.signer_infos[0].sequence, 5);
        assert_eq!(tx.signatures.len(), 1);

        // The bytes on the wire must verify on their own for (test-1, 42, 5).
        let raw = TxRaw::decode(broadcasts[0].as_slice()).unwrap();
        let signing_key = k256::ecdsa::SigningKey::from_slice(&hex::decode(SENDER_KEY).unwrap()).unwrap();
        let verifying_key = signing_key.verifying_key();
        let signature = Signature::from_slice(&raw.signatures[0]).unwrap();
        let wire_sign_bytes = |chain_id: &str, account_number: u64| {
            ProtoSignDoc {
                body_bytes: raw.body_bytes.clone(),
                auth_info_bytes: raw.auth_info_bytes.clone(),
                chain_id: chain_id.to_string(),
                account_number,
            }
            .encode_to_vec()
        };
        assert!(verifying_key.verify(&wire_sign_bytes("test-1", 42), &signature).is_ok());
        assert!(verifying_key.verify(&wire_sign_bytes("test-1", 43), &signature).is_err());
        assert!(verifying_key.verify(&wire_sign_bytes("test-2", 42), &signature).is_err());
    }

    #[tokio::test]
    async fn zero_fee_is_an_empty_fee_list() {
        let chain = StubChain::new(42, 5);
        let mut req = request();
        req.fee_amount = 0;
        make_transfer(&chain, "uatom", &req, &sealed_sender_key()).await.unwrap();

        let broadcasts = chain.broadcasts.lock().unwrap();
        let tx = Tx::from_bytes(&broadcasts[0]).unwrap();
        assert!(tx.auth_info.fee.amount.is_empty());
        assert_eq!(tx.auth_info.fee.gas_limit, 200_000);
        assert_eq!(MsgSend::from_any(&tx.body.messages[0]).unwrap().amount[0].amount, 100);
    }

    #[tokio::test]
    async fn signature_is_bound_to_chain_account_and_sequence() {
        let chain = StubChain::new(42, 5);
        let maker = maker(&chain).await;
        let unsigned = maker.build_tx("uatom", 100, 200_000, 500, "").unwrap();
        let signed = maker.sign_tx(unsigned).unwrap();

        let test_1 = parse_chain_id("test-1").unwrap();
        let other = parse_chain_id("test-2").unwrap();
        assert!(signed.verify(&test_1, 42, 5).is_ok());
        assert!(signed.verify(&other, 42, 5).is_err());
        assert!(signed.verify(&test_1, 43, 5).is_err());
        assert!(signed.verify(&test_1, 42, 6).is_err());
    }

    #[tokio::test]
    async fn signing_is_deterministic() {
        let chain = StubChain::new(42, 5);
        let first = {
            let maker = maker(&chain).await;
            let unsigned = maker.build_tx("uatom", 100, 200_000, 500, "memo").unwrap();
            maker.sign_tx(unsigned).unwrap()
        };
        let second = {
            let maker = maker(&chain).await;
            let unsigned = maker.build_tx("uatom", 100, 200_000, 500, "memo").unwrap();
            maker.sign_tx(unsigned).unwrap()
        };
        assert_eq!(first.sign_bytes(), second.sign_bytes());
        assert_eq!(first.signature(), second.signature());
        assert_eq!(first.tx_hash(), second.tx_hash());
    }

    #[tokio::test]
    async fn build_keeps_fee_gas_and_memo() {
        let chain = StubChain::new(1, 0);
        let maker = maker(&chain).await;
        let unsigned = maker.build_tx("uatom", 1, 80_000, 0, "hello").unwrap();
        assert_eq!(unsigned.gas_limit(), 80_000);
        assert_eq!(unsigned.fee_amount(), 0);
        assert_eq!(unsigned.denom(), "uatom");
        assert_eq!(unsigned.memo(), "hello");

        let signed = maker.sign_tx(unsigned).unwrap();
        let described = signed.describe();
        assert_eq!(described["body"]["messages"][0]["@type"], "/cosmos.bank.v1beta1.MsgSend");
        assert_eq!(described["auth_info"]["fee"]["gas_limit"], "80000");
        assert_eq!(described["auth_info"]["fee"]["amount"], json!([]));
    }

    #[tokio::test]
    async fn invalid_denom_fails_build() {
        let chain = StubChain::new(1, 0);
        let maker = maker(&chain).await;
        assert!(maker.build_tx("!!", 1, 1, 1, "").is_err());
    }

    #[tokio::test]
    async fn invalid_receiver_is_client_error_before_query() {
        let chain = StubChain::new(42, 5);
        let mut req = request();
        req.to = "addr2".to_string();
        let err = make_transfer(&chain, "uatom", &req, &sealed_sender_key()).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("to"));
        assert!(chain.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn key_of_another_account_is_refused() {
        let chain = StubChain::new(42, 5);
        let foreign = seal_private_key(RECEIVER_KEY, "pw").unwrap().into_bytes();
        let err = make_transfer(&chain, "uatom", &request(), &foreign).await.unwrap_err();
        assert!(!err.is_client_error());
        assert!(chain.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_broadcast_is_error() {
        let mut chain = StubChain::new(42, 5);
        chain.code = 11;
        let err = make_transfer(&chain, "uatom", &request(), &sealed_sender_key()).await.unwrap_err();
        assert!(matches!(err, TxError::Chain(ChainError::Rejected { code: 11, .. })));
    }
}
