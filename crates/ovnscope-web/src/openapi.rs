//! OpenAPI documentation definition.

use ovnscope_core::api::{
    Edge, EdgeKind, Group, Metadata, Node, NodeKind, Snapshot, SourceHealth, Warning, WarningCode,
};
use utoipa::OpenApi;

use crate::handlers::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_health,
        crate::handlers::handle_node_snapshot,
    ),
    components(schemas(
        Snapshot,
        Metadata,
        SourceHealth,
        Node,
        NodeKind,
        Edge,
        EdgeKind,
        Group,
        Warning,
        WarningCode,
        ErrorBody,
    )),
    info(
        title = "ovnscope API",
        version = "1.0",
        description = "OVN logical topology snapshots per Kubernetes node"
    )
)]
pub(crate) struct ApiDoc;
