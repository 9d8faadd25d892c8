//! Generated protobuf code for the flow scheduler API
//!
//! This module contains the generated Rust code from protobuf definitions.
//! The code is generated at build time by tonic-build.
//!
//! If protoc is not available, stub types are provided for development.

#[cfg(feature = "proto-gen")]
pub mod flowsched {
    pub mod v1 {
        tonic::include_proto!("flowsched.v1");
    }
}

// Provide stub types when proto generation is not available
#[cfg(not(feature = "proto-gen"))]
pub mod flowsched {
    pub mod v1 {
        use prost::Message;

        #[derive(Clone, PartialEq, Message)]
        pub struct TaskRef {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, tag = "2")]
            pub name: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct TaskDescription {
            #[prost(message, optional, tag = "1")]
            pub r#ref: Option<TaskRef>,
            #[prost(uint64, tag = "2")]
            pub cpu_request_millicores: u64,
            #[prost(uint64, tag = "3")]
            pub memory_request_kb: u64,
            #[prost(string, tag = "4")]
            pub owner_ref: String,
            #[prost(message, optional, tag = "5")]
            pub constraints: Option<TaskConstraints>,
            #[prost(message, repeated, tag = "6")]
            pub tolerations: Vec<Toleration>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct TaskConstraints {
            #[prost(message, repeated, tag = "1")]
            pub node_terms: Vec<NodeSelectorTerm>,
            #[prost(message, repeated, tag = "2")]
            pub colocate_terms: Vec<AffinityTerm>,
            #[prost(message, repeated, tag = "3")]
            pub spread_terms: Vec<AffinityTerm>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct NodeSelectorTerm {
            #[prost(message, repeated, tag = "1")]
            pub match_expressions: Vec<MatchExpression>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct AffinityTerm {
            #[prost(message, repeated, tag = "1")]
            pub match_expressions: Vec<MatchExpression>,
            #[prost(string, tag = "2")]
            pub topology_key: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct MatchExpression {
            #[prost(string, tag = "1")]
            pub key: String,
            #[prost(string, tag = "2")]
            pub operator: String,
            #[prost(string, repeated, tag = "3")]
            pub values: Vec<String>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct Toleration {
            #[prost(string, tag = "1")]
            pub key: String,
            #[prost(string, tag = "2")]
            pub operator: String,
            #[prost(string, tag = "3")]
            pub value: String,
            #[prost(string, tag = "4")]
            pub effect: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct TaskReply {
            #[prost(int32, tag = "1")]
            pub code: i32,
            #[prost(string, tag = "2")]
            pub message: String,
        }

        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(i32)]
        pub enum ReplyCode {
            #[default]
            Unspecified = 0,
            Ok = 1,
            TaskNotFound = 2,
            TaskAlreadyExists = 3,
            InvalidTask = 4,
            InternalError = 5,
        }

        impl ReplyCode {
            pub fn from_i32(value: i32) -> ReplyCode {
                match value {
                    1 => ReplyCode::Ok,
                    2 => ReplyCode::TaskNotFound,
                    3 => ReplyCode::TaskAlreadyExists,
                    4 => ReplyCode::InvalidTask,
                    5 => ReplyCode::InternalError,
                    _ => ReplyCode::Unspecified,
                }
            }

            pub fn as_str_name(&self) -> &'static str {
                match self {
                    ReplyCode::Unspecified => "REPLY_CODE_UNSPECIFIED",
                    ReplyCode::Ok => "REPLY_CODE_OK",
                    ReplyCode::TaskNotFound => "REPLY_CODE_TASK_NOT_FOUND",
                    ReplyCode::TaskAlreadyExists => "REPLY_CODE_TASK_ALREADY_EXISTS",
                    ReplyCode::InvalidTask => "REPLY_CODE_INVALID_TASK",
                    ReplyCode::InternalError => "REPLY_CODE_INTERNAL_ERROR",
                }
            }
        }

        pub mod flow_scheduler_client {
            use super::*;
            use tonic::codegen::*;
            use tonic::transport::Uri;

            #[derive(Debug, Clone)]
            pub struct FlowSchedulerClient<T> {
                inner: tonic::client::Grpc<T>,
            }

            impl FlowSchedulerClient<tonic::transport::Channel> {
                pub fn new(channel: tonic::transport::Channel) -> Self {
                    let inner = tonic::client::Grpc::new(channel);
                    Self { inner }
                }
            }

            impl<T> FlowSchedulerClient<T>
            where
                T: tonic::client::GrpcService<tonic::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + Send,
            {
                pub fn with_origin(inner: T, origin: Uri) -> Self {
                    let inner = tonic::client::Grpc::with_origin(inner, origin);
                    Self { inner }
                }

                pub async fn submit_task(
                    &mut self,
                    request: impl tonic::IntoRequest<TaskDescription>,
                ) -> Result<tonic::Response<TaskReply>, tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/flowsched.v1.FlowScheduler/SubmitTask",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn update_task(
                    &mut self,
                    request: impl tonic::IntoRequest<TaskDescription>,
                ) -> Result<tonic::Response<TaskReply>, tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/flowsched.v1.FlowScheduler/UpdateTask",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn remove_task(
                    &mut self,
                    request: impl tonic::IntoRequest<TaskRef>,
                ) -> Result<tonic::Response<TaskReply>, tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/flowsched.v1.FlowScheduler/RemoveTask",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn complete_task(
                    &mut self,
                    request: impl tonic::IntoRequest<TaskRef>,
                ) -> Result<tonic::Response<TaskReply>, tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/flowsched.v1.FlowScheduler/CompleteTask",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn fail_task(
                    &mut self,
                    request: impl tonic::IntoRequest<TaskRef>,
                ) -> Result<tonic::Response<TaskReply>, tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/flowsched.v1.FlowScheduler/FailTask",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }
            }
        }
    }
}

pub use flowsched::v1::flow_scheduler_client::FlowSchedulerClient;
pub use flowsched::v1::*;
