use super::{
    fixtures::code_samples::*,
    fixtures::failing_code::*,
    utils::defaults::{short_timeout, test_config},
    utils::runtimes,
};
use crate::{
    languages::{self, skip_if_not_available},
    Backend, CodeExecutionService, Error, ExecutionRequest, Language, Result,
};
use std::path::Path;
use tokio_test::{assert_err, assert_ok};

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

fn tools_missing(language: Language) -> bool {
    skip_if_not_available(&languages::profile(language).required_tools())
}

/// Jobs run on the host's toolchains when no container runtime exists
pub mod local_execution {
    use super::*;

    async fn test_language_execution(language: Language, code: &str, expected: &str) -> Result<()> {
        if tools_missing(language) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;
        assert!(!service.container_available());

        let result = service
            .execute(ExecutionRequest::new(language.as_str(), code))
            .await?;
        assert_eq!(result.stdout, expected);
        assert_eq!(result.backend, Backend::Local);
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_python_execution() -> Result<()> {
        test_language_execution(Language::Python, PYTHON_HELLO, "Hello from Python!\n").await
    }

    #[tokio::test]
    async fn test_javascript_execution() -> Result<()> {
        test_language_execution(Language::JavaScript, JS_HELLO, "Hello from JavaScript!\n").await
    }

    #[tokio::test]
    async fn test_java_execution() -> Result<()> {
        test_language_execution(Language::Java, JAVA_HELLO, "Hello from Java!\n").await
    }

    #[tokio::test]
    async fn test_python_arithmetic() -> Result<()> {
        test_language_execution(Language::Python, PYTHON_ARITHMETIC, "2\n").await
    }
}

pub mod error_handling {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_language_touches_nothing() -> Result<()> {
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;

        for language in ["go", "ruby", "Python"] {
            let result = service
                .execute(ExecutionRequest::new(language, "print(1)"))
                .await;
            assert!(matches!(result, Err(Error::UnsupportedLanguage(_))));
        }
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() -> Result<()> {
        if tools_missing(Language::Python) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_timeout(short_timeout());
        let service = CodeExecutionService::new(config).await?;

        let started = std::time::Instant::now();
        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_INFINITE_LOOP))
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_javascript_busy_loop_times_out() -> Result<()> {
        if tools_missing(Language::JavaScript) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_timeout(short_timeout());
        let service = CodeExecutionService::new(config).await?;

        let result = service
            .execute(ExecutionRequest::new("javascript", JS_INFINITE_LOOP))
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_runtime_error_carries_stderr() -> Result<()> {
        if tools_missing(Language::Python) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;

        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_DIVISION_BY_ZERO))
            .await;
        match result {
            Err(Error::ExecutionError(stderr)) => assert!(stderr.contains("ZeroDivisionError")),
            other => panic!("Expected an execution error, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_silent_failure_reports_status() -> Result<()> {
        if tools_missing(Language::Python) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;

        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_SILENT_EXIT))
            .await;
        assert!(
            matches!(result, Err(Error::ExecutionError(msg)) if msg == "Process exited with status 3")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_exit_status_152_is_not_a_timeout() -> Result<()> {
        if tools_missing(Language::Python) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;

        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_EXIT_152))
            .await;
        assert!(
            matches!(result, Err(Error::ExecutionError(msg)) if msg == "Process exited with status 152")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_detached_child_does_not_outlive_deadline() -> Result<()> {
        if tools_missing(Language::Python) || skip_if_not_available(&["sleep"]) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_timeout(short_timeout());
        let service = CodeExecutionService::new(config).await?;

        let started = std::time::Instant::now();
        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_DETACHED_CHILD))
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_java_compile_error() -> Result<()> {
        if tools_missing(Language::Java) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;

        let result = service
            .execute(ExecutionRequest::new("java", JAVA_MISSING_SEMICOLON))
            .await;
        match result {
            Err(Error::CompilationError(stderr)) => assert!(stderr.contains("';' expected")),
            other => panic!("Expected a compilation error, got {:?}", other),
        }
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }
}

/// Backend selection against stand-in container CLIs
pub mod backend_selection {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_daemon_falls_back_to_local() -> Result<()> {
        if tools_missing(Language::Python) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_container_runtime(runtimes::daemon_down());
        let service = CodeExecutionService::new(config).await?;
        assert!(service.container_available());

        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_ARITHMETIC))
            .await?;

        assert_eq!(result.stdout, "2\n");
        assert_eq!(result.backend, Backend::Local);
        assert!(!service.container_available());
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_daemon_without_fallback() -> Result<()> {
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path())
            .with_container_runtime(runtimes::daemon_down())
            .with_local_fallback(false);
        let service = CodeExecutionService::new(config).await?;

        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_ARITHMETIC))
            .await;
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_reachable_runtime_runs_in_container() -> Result<()> {
        if tools_missing(Language::Python) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_container_runtime(runtimes::passthrough());
        let service = CodeExecutionService::new(config).await?;
        assert!(service.container_available());

        let result = service
            .execute(ExecutionRequest::new("python", PYTHON_ARITHMETIC))
            .await?;

        assert_eq!(result.stdout, "2\n");
        assert_eq!(result.backend, Backend::Container);
        assert!(service.container_available());
        Ok(())
    }

    #[tokio::test]
    async fn test_javascript_runs_in_container() -> Result<()> {
        if tools_missing(Language::JavaScript) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_container_runtime(runtimes::passthrough());
        let service = CodeExecutionService::new(config).await?;

        let result = service
            .execute(ExecutionRequest::new("javascript", JS_ARITHMETIC))
            .await?;
        assert_eq!(result.stdout, "2\n");
        assert_eq!(result.backend, Backend::Container);
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_java_compiles_and_runs_in_container() -> Result<()> {
        if tools_missing(Language::Java) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_container_runtime(runtimes::passthrough());
        let service = CodeExecutionService::new(config).await?;

        let result = service
            .execute(ExecutionRequest::new("java", JAVA_HELLO))
            .await?;
        assert_eq!(result.stdout, "Hello from Java!\n");
        assert_eq!(result.backend, Backend::Container);
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }
}

pub mod concurrent_execution {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_jobs_do_not_cross_talk() -> Result<()> {
        if tools_missing(Language::Python) {
            return Ok(());
        }
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;

        let mut handles = vec![];
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let code = format!("print({})", i);
                (i, service.execute(ExecutionRequest::new("python", code)).await)
            }));
        }

        for handle in handles {
            let (i, result) = handle.await.unwrap();
            assert_eq!(result?.stdout, format!("{}\n", i));
        }
        assert!(is_empty_dir(service.scratch_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn test_admission_slots() -> Result<()> {
        let scratch = tempfile::tempdir().unwrap();
        let service = CodeExecutionService::new(test_config(scratch.path())).await?;
        assert_eq!(service.get_available_slots(), None);

        let config = test_config(scratch.path()).with_max_concurrent_executions(Some(2));
        let service = CodeExecutionService::new(config).await?;
        assert_eq!(service.get_available_slots(), Some(2));
        Ok(())
    }
}

pub mod startup {
    use super::*;

    #[tokio::test]
    async fn test_stale_job_dirs_are_swept() {
        let scratch = tempfile::tempdir().unwrap();
        let stale = scratch.path().join("job-0123456789abcdef");
        std::fs::create_dir(&stale).unwrap();
        std::fs::write(stale.join("main.py"), "print(1)").unwrap();
        let unrelated = scratch.path().join("notes.txt");
        std::fs::write(&unrelated, "keep").unwrap();

        let service = CodeExecutionService::new(test_config(scratch.path())).await;
        assert_ok!(service);

        assert!(!stale.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let config = test_config(scratch.path()).with_timeout(std::time::Duration::ZERO);
        let result = CodeExecutionService::new(config).await.map(|_| ());
        let err = assert_err!(result);
        assert!(matches!(err, Error::Config(_)));
    }
}
