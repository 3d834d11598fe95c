//! The heap's physical tuple: one row version as stored on a page.

use bytes::{BufMut, Bytes, BytesMut};

use super::error::HeapError;
use super::record::Record;
use super::tuple_header::{TUPLE_HEADER_SIZE, TupleHeader};
use crate::datum::{Type, Value};
use crate::tableam::{TableId, TupleId};

/// A row version copied out of a heap page.
///
/// `tid` is where this copy was read from; `header.ctid` is the forward
/// link of the update chain.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapTuple {
    /// Physical address the tuple was read from.
    pub tid: TupleId,
    /// Owning relation.
    pub table_id: TableId,
    /// MVCC header.
    pub header: TupleHeader,
    /// Serialized [`Record`].
    pub data: Bytes,
}

impl HeapTuple {
    /// Copies a tuple out of page memory.
    pub fn from_page(tid: TupleId, table_id: TableId, header: TupleHeader, data: &[u8]) -> Self {
        Self {
            tid,
            table_id,
            header,
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Decodes the column values using the relation's column types.
    pub fn record(&self, schema: &[Type]) -> Result<Record, HeapError> {
        Ok(Record::deserialize(&self.data, schema)?)
    }

    /// Convenience for `record(schema)?.values`.
    pub fn values(&self, schema: &[Type]) -> Result<Vec<Value>, HeapError> {
        Ok(self.record(schema)?.values)
    }

    /// Encodes the tuple as an external datum: header followed by record.
    pub fn to_datum(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(TUPLE_HEADER_SIZE + self.data.len());
        buf.resize(TUPLE_HEADER_SIZE, 0);
        self.header.write(&mut buf[..TUPLE_HEADER_SIZE]);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Materializes a tuple from an external datum produced by
    /// [`to_datum`](Self::to_datum).
    ///
    /// The result has no physical address of its own; `tid` is taken from
    /// the header's ctid.
    pub fn from_datum(datum: &Bytes, table_id: TableId) -> Result<Self, HeapError> {
        let header = TupleHeader::read(datum)?;
        let tid = if header.speculative_token().is_some() {
            TupleId::INVALID
        } else {
            header.ctid
        };
        Ok(Self {
            tid,
            table_id,
            header,
            data: datum.slice(TUPLE_HEADER_SIZE..),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageId;
    use crate::tx::{CommandId, TxId};

    fn sample() -> HeapTuple {
        let mut header = TupleHeader::new_insert(TxId::new(4), CommandId::new(1));
        let tid = TupleId::new(PageId::new(2), 5);
        header.ctid = tid;
        let record = Record::new(vec![Value::Int32(1), Value::Text("a".into())]);
        HeapTuple::from_page(tid, TableId(7), header, &record.to_bytes().unwrap())
    }

    #[test]
    fn test_datum_preserves_header_and_values() {
        let tuple = sample();
        let datum = tuple.to_datum();
        assert_eq!(datum.len(), TUPLE_HEADER_SIZE + tuple.data.len());

        let back = HeapTuple::from_datum(&datum, TableId(7)).unwrap();
        assert_eq!(back, tuple);
        assert_eq!(
            back.values(&[Type::Int4, Type::Text]).unwrap(),
            vec![Value::Int32(1), Value::Text("a".into())]
        );
    }

    #[test]
    fn test_from_datum_rejects_short_input() {
        let datum = Bytes::from_static(&[0u8; 12]);
        assert!(matches!(
            HeapTuple::from_datum(&datum, TableId(1)),
            Err(HeapError::CorruptedTuple(_))
        ));
    }

    #[test]
    fn test_from_datum_speculative_has_no_tid() {
        let mut tuple = sample();
        tuple.header.set_speculative(3);
        let back = HeapTuple::from_datum(&tuple.to_datum(), TableId(7)).unwrap();
        assert_eq!(back.tid, TupleId::INVALID);
        assert_eq!(back.header.speculative_token(), Some(3));
    }
}
