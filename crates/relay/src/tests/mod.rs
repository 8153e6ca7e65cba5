//! End-to-End-Tests gegen einen echten Listener auf einem freien Port

mod support;
