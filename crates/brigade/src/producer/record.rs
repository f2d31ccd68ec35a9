use brigade_types::{Offset, PartitionId};

/// Broker acknowledgment for one delivered message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    partition: PartitionId,
    offset: Offset,
}

impl DeliveryReceipt {
    pub fn new(partition: PartitionId, offset: Offset) -> Self {
        Self { partition, offset }
    }

    /// Partition the record was assigned to.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Offset of the record in its partition.
    pub fn offset(&self) -> Offset {
        self.offset
    }
}
