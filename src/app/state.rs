// ==========================================
// 列车投运排程 - 应用状态
// ==========================================
// 职责: 打开共享连接、建表，组装仓储 / 引擎 / API
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ScheduleApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::{SchedulingEngine, SchedulingRepositories};
use crate::repository::{
    DailyScheduleRepository, FleetRepository, KpiMetricRepository, TrainingDataRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 排程API
    pub schedule_api: Arc<ScheduleApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 仓储集合（种子数据/查询用）
    pub repositories: SchedulingRepositories,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;

        match read_schema_version(&conn) {
            Ok(Some(v)) if v == CURRENT_SCHEMA_VERSION => {}
            Ok(v) => tracing::warn!(
                found = ?v,
                expected = CURRENT_SCHEMA_VERSION,
                "schema_version 与程序版本不一致"
            ),
            Err(e) => tracing::warn!("schema_version 读取失败(将继续启动): {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let repositories = SchedulingRepositories::new(
            Arc::new(FleetRepository::from_connection(conn.clone())),
            Arc::new(DailyScheduleRepository::from_connection(conn.clone())),
            Arc::new(KpiMetricRepository::from_connection(conn.clone())),
            Arc::new(TrainingDataRepository::from_connection(conn.clone())),
        );

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let stores = Arc::new(repositories.clone());
        let engine = Arc::new(SchedulingEngine::new(stores.clone(), stores));

        // ==========================================
        // 创建API实例
        // ==========================================
        let schedule_api = Arc::new(ScheduleApi::new(
            engine,
            config_manager.clone(),
            repositories.schedule_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            schedule_api,
            config_manager,
            repositories,
        })
    }
}

/// 默认数据库路径
///
/// 顺序: 环境变量 TRAINSET_INDUCTION_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("TRAINSET_INDUCTION_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./trainset_induction.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("trainset-induction");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("trainset_induction.db");
        }
    }

    path.to_string_lossy().to_string()
}
