use std::sync::LazyLock;

use prometheus::{Histogram, IntCounter, TextEncoder, register_histogram, register_int_counter};

static SEARCH_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("semsearch_search_count", "搜索请求总数").unwrap()
});

static SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("semsearch_search_duration", "搜索耗时（秒）").unwrap()
});

/// 记录一次搜索
pub fn observe_search(duration: f64) {
    SEARCH_COUNT.inc();
    SEARCH_DURATION.observe(duration);
}

/// 导出全部指标
pub fn gather() -> String {
    TextEncoder::new().encode_to_string(&prometheus::gather()).unwrap_or_default()
}
