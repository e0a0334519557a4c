// ==========================================
// 列车投运排程 - 命令行主入口
// ==========================================
// 用法: trainset-induction [db_path] [schedule_date] [--force]
//   schedule_date 缺省为明天（UTC）
//   --force 忽略已有排程重新计算
// 输出: JSON 响应（stdout），日志写 stderr
// ==========================================

use anyhow::Context;
use chrono::{Duration, Utc};
use trainset_induction::api::ScheduleRequest;
use trainset_induction::app::{get_default_db_path, AppState};
use trainset_induction::engine::cancellation_pair;
use trainset_induction::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("TRAINSET_LOG_FORMAT").as_deref() == Ok("json") {
        logging::init_json();
    } else {
        logging::init();
    }

    let mut force = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--force" {
            force = true;
        } else {
            positional.push(arg);
        }
    }
    let mut positional = positional.into_iter();

    let db_path = positional.next().unwrap_or_else(get_default_db_path);
    let schedule_date = positional
        .next()
        .unwrap_or_else(|| (Utc::now() + Duration::days(1)).date_naive().to_string());

    tracing::info!("==================================================");
    tracing::info!("{} {}", trainset_induction::APP_NAME, trainset_induction::VERSION);
    tracing::info!("数据库: {}  排程日期: {}", db_path, schedule_date);
    tracing::info!("==================================================");

    let state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    // Ctrl-C 取消正在进行的排程
    let (handle, cancel) = cancellation_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，取消排程");
            handle.cancel();
        }
    });

    let mut request = ScheduleRequest::new(schedule_date);
    request.force_recompute = force;

    let response = state
        .schedule_api
        .generate_schedule_with_cancel(request, cancel)
        .await;

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("响应序列化失败")?
    );

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
