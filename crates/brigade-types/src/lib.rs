pub mod defaults;

#[cfg(feature = "events")]
pub mod event;

//
// Types
//
pub type Reason = String;

// Topic
pub type TopicName = String;
pub type PartitionId = i32;
pub type PartitionCount = i32;

// Consumer group
pub type GroupId = String;

// Partition-local sequence position of a record
pub type Offset = i64;
