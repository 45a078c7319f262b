//! Metric instrumentation for [`DbrpMappingService`] implementations.

use async_trait::async_trait;
use influxdb3_authz::Caller;
use influxdb3_id::{DbrpId, OrgId};
use iox_time::{SystemProvider, TimeProvider};
use metric::{DurationHistogram, Metric};

use crate::{DbrpMapping, DbrpMappingFilter, DbrpMappingService, FindOptions, Result};

const DBRP_OP_DURATION_METRIC: &str = "dbrp_op_duration";

/// Decorates a [`DbrpMappingService`] with a latency histogram for each
/// method.
///
/// Values are recorded under the `dbrp_op_duration` metric, labelled by
/// operation name and result (success/error).
#[derive(Debug)]
pub struct MetricDecorator<T, P = SystemProvider> {
    inner: T,
    time_provider: P,
    metric: Metric<DurationHistogram>,
}

impl<T> MetricDecorator<T> {
    /// Wrap `inner`, recording operation latency in `registry`.
    pub fn new(inner: T, registry: &metric::Registry) -> Self {
        Self::new_with_time_provider(inner, registry, SystemProvider::default())
    }
}

impl<T, P> MetricDecorator<T, P> {
    pub fn new_with_time_provider(inner: T, registry: &metric::Registry, time_provider: P) -> Self {
        let metric = registry.register_metric(
            DBRP_OP_DURATION_METRIC,
            "duration of DBRP mapping service operations",
        );
        Self {
            inner,
            time_provider,
            metric,
        }
    }
}

/// Emit an impl of [`DbrpMappingService`] that delegates each listed method
/// to the inner service, recording its duration and result.
///
/// Every trait method must be listed or the impl will not compile.
macro_rules! decorate {
    (
        methods = [$(
            $op:literal = $method:ident(
                &self $(,)?
                $($arg:ident : $t:ty),*
            ) -> Result<$out:ty>;
        )+]
    ) => {
        #[async_trait]
        impl<T, P> DbrpMappingService for MetricDecorator<T, P>
        where
            T: DbrpMappingService,
            P: TimeProvider,
        {
            $(
                async fn $method(&self, $($arg : $t),*) -> Result<$out> {
                    let t = self.time_provider.now();
                    let res = self.inner.$method($($arg),*).await;

                    // Drop the measurement if time went backwards.
                    if let Some(delta) = self.time_provider.now().checked_duration_since(t) {
                        let tag = match &res {
                            Ok(_) => "success",
                            Err(_) => "error",
                        };
                        self.metric
                            .recorder(&[("op", $op), ("result", tag)])
                            .record(delta);
                    }

                    res
                }
            )+
        }
    };
}

decorate!(
    methods = [
        "find_by_id" = find_by_id(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<DbrpMapping>;
        "find_many" = find_many(&self, caller: &Caller, filter: &DbrpMappingFilter, opts: &FindOptions) -> Result<(Vec<DbrpMapping>, usize)>;
        "create" = create(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping>;
        "update" = update(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping>;
        "delete" = delete(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<()>;
    ]
);
