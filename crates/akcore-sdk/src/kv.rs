//! The host's per-plugin key/value store.
//!
//! Keys and values are raw bytes. Keys are ordered lexicographically by the
//! host, which is what makes [`Bus::kv_list`] pagination well defined.

use std::collections::VecDeque;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bus::Bus;
use crate::error::{BusError, BusResult};
use crate::message::{Error, ExternalMessageType};
use crate::rpc::Call;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvGetRequest {
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvGetResponse {
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvSetRequest {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvSetResponse {}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvListRequest {
    /// Only keys starting with this are matched. Empty matches everything.
    pub prefix: Vec<u8>,
    /// Page size. Zero returns every match.
    pub limit: u32,
    /// Matches to skip before the page starts.
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvListResponse {
    pub keys: Vec<Vec<u8>>,
    /// Matches for the prefix, regardless of limit and offset.
    pub total_matches: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvDeleteRequest {
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct KvDeleteResponse {}

impl Call for KvGetRequest {
    const MESSAGE_TYPE: i32 = ExternalMessageType::KvGetReq as i32;
    type Response = KvGetResponse;
}

impl Call for KvSetRequest {
    const MESSAGE_TYPE: i32 = ExternalMessageType::KvSetReq as i32;
    type Response = KvSetResponse;
}

impl Call for KvListRequest {
    const MESSAGE_TYPE: i32 = ExternalMessageType::KvListReq as i32;
    type Response = KvListResponse;
}

impl Call for KvDeleteRequest {
    const MESSAGE_TYPE: i32 = ExternalMessageType::KvDeleteReq as i32;
    type Response = KvDeleteResponse;
}

/// `NOT_FOUND` becomes [`BusError::NotFound`]; everything else stays a host
/// error.
fn kv_error(err: Error) -> BusError {
    if err.is_not_found() {
        BusError::NotFound
    } else {
        BusError::Host(err)
    }
}

impl<T: Transport> Bus<T> {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`BusError::NotFound`] if the key is absent, so callers can tell an
    /// absent key from an unavailable store.
    pub fn kv_get(&self, key: impl AsRef<[u8]>) -> BusResult<Vec<u8>> {
        let req = KvGetRequest {
            key: key.as_ref().to_vec(),
        };
        self.call(&req, |reply| reply.map(|resp| resp.value).map_err(kv_error))
    }

    /// Store `value` under `key`, overwriting whatever was there.
    ///
    /// # Errors
    ///
    /// Returns host, transport or encoding errors.
    pub fn kv_set(&self, key: impl AsRef<[u8]>, value: &[u8]) -> BusResult<()> {
        let req = KvSetRequest {
            key: key.as_ref().to_vec(),
            value: value.to_vec(),
        };
        self.call(&req, |reply| reply.map(|_| ()).map_err(kv_error))
    }

    /// List keys starting with `prefix`.
    ///
    /// `limit == 0` returns every match. An `offset` at or past the total
    /// number of matches returns no keys. To page, keep `limit` fixed and
    /// advance `offset` by the number of keys returned until it reaches
    /// `total_matches`, or use [`Bus::kv_list_all`].
    ///
    /// # Errors
    ///
    /// Returns host, transport or encoding errors.
    pub fn kv_list(
        &self,
        prefix: impl AsRef<[u8]>,
        limit: u32,
        offset: u32,
    ) -> BusResult<KvListResponse> {
        let req = KvListRequest {
            prefix: prefix.as_ref().to_vec(),
            limit,
            offset,
        };
        self.call(&req, |reply| reply.map_err(kv_error))
    }

    /// Iterate over every key starting with `prefix`, fetching `page_size`
    /// keys per request.
    pub fn kv_list_all(&self, prefix: impl AsRef<[u8]>, page_size: u32) -> KvKeys<'_, T> {
        KvKeys {
            bus: self,
            prefix: prefix.as_ref().to_vec(),
            page_size,
            offset: 0,
            page: VecDeque::new(),
            done: false,
        }
    }

    /// Delete `key`. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns host, transport or encoding errors.
    pub fn kv_delete(&self, key: impl AsRef<[u8]>) -> BusResult<()> {
        let req = KvDeleteRequest {
            key: key.as_ref().to_vec(),
        };
        self.call(&req, |reply| match reply {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(BusError::Host(err)),
        })
    }

    /// Fetch and borsh-decode the value under `key`.
    ///
    /// # Errors
    ///
    /// Anything [`Bus::kv_get`] returns, or [`BusError::Unmarshal`] if the
    /// stored bytes are not a `V`.
    pub fn kv_get_borsh<V: BorshDeserialize>(&self, key: impl AsRef<[u8]>) -> BusResult<V> {
        let bytes = self.kv_get(key)?;
        V::try_from_slice(&bytes).map_err(BusError::Unmarshal)
    }

    /// Borsh-encode `value` and store it under `key`.
    ///
    /// # Errors
    ///
    /// [`BusError::Marshal`] if `value` does not encode, otherwise anything
    /// [`Bus::kv_set`] returns.
    pub fn kv_set_borsh<V: BorshSerialize>(&self, key: impl AsRef<[u8]>, value: &V) -> BusResult<()> {
        let bytes = borsh::to_vec(value).map_err(BusError::Marshal)?;
        self.kv_set(key, &bytes)
    }

    /// Fetch the value under `key` and parse it as JSON.
    ///
    /// # Errors
    ///
    /// Anything [`Bus::kv_get`] returns, or [`BusError::Json`].
    pub fn kv_get_json<V: DeserializeOwned>(&self, key: impl AsRef<[u8]>) -> BusResult<V> {
        let bytes = self.kv_get(key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Store `value` under `key` as JSON.
    ///
    /// # Errors
    ///
    /// [`BusError::Json`] if `value` does not serialize, otherwise anything
    /// [`Bus::kv_set`] returns.
    pub fn kv_set_json<V: Serialize>(&self, key: impl AsRef<[u8]>, value: &V) -> BusResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.kv_set(key, &bytes)
    }
}

/// Iterator over all keys with a prefix, one page per request.
///
/// Created by [`Bus::kv_list_all`]. Stops after the first error.
#[derive(Debug)]
pub struct KvKeys<'b, T> {
    bus: &'b Bus<T>,
    prefix: Vec<u8>,
    page_size: u32,
    offset: u32,
    page: VecDeque<Vec<u8>>,
    done: bool,
}

impl<T: Transport> KvKeys<'_, T> {
    fn fetch(&mut self) -> BusResult<()> {
        let resp = self.bus.kv_list(&self.prefix, self.page_size, self.offset)?;
        let returned = u32::try_from(resp.keys.len()).unwrap_or(u32::MAX);
        self.offset = self.offset.saturating_add(returned);
        if returned == 0 || self.offset >= resp.total_matches {
            self.done = true;
        }
        self.page.extend(resp.keys);
        Ok(())
    }
}

impl<T: Transport> Iterator for KvKeys<'_, T> {
    type Item = BusResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(key) = self.page.pop_front() {
            return Some(Ok(key));
        }
        if self.done {
            return None;
        }
        if let Err(e) = self.fetch() {
            self.done = true;
            return Some(Err(e));
        }
        self.page.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_sentinel() {
        let err = kv_error(Error::new(crate::message::CommonErrorCode::NotFound));
        assert!(matches!(err, BusError::NotFound));
    }

    #[test]
    fn test_other_codes_stay_host_errors() {
        let err = kv_error(Error::new(crate::message::CommonErrorCode::Timeout));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_kv_message_types_are_distinct() {
        let types = [
            KvGetRequest::MESSAGE_TYPE,
            KvSetRequest::MESSAGE_TYPE,
            KvListRequest::MESSAGE_TYPE,
            KvDeleteRequest::MESSAGE_TYPE,
        ];
        for (i, a) in types.iter().enumerate() {
            for b in &types[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
