use mra_core::{Credential, SecretError, SecretResolver};

/// 环境变量引用前缀。
pub const ENV_PREFIX: &str = "env:";

/// 解析 `env:VAR` 引用，其余字符串按明文凭据处理。
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSecretResolver;

impl EnvSecretResolver {
    fn lookup(&self, reference: &str, variable: &str) -> Result<String, SecretError> {
        std::env::var(variable).map_err(|_| SecretError::Missing {
            reference: reference.to_owned(),
        })
    }
}

impl SecretResolver for EnvSecretResolver {
    fn resolve(&self, reference: &str) -> Result<Credential, SecretError> {
        let secret = match reference.strip_prefix(ENV_PREFIX) {
            Some(variable) => self.lookup(reference, variable.trim())?,
            None => reference.to_owned(),
        };
        if secret.trim().is_empty() {
            return Err(SecretError::Empty {
                reference: reference.to_owned(),
            });
        }
        Ok(Credential::new(secret.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_references_are_used_verbatim() {
        let credential = EnvSecretResolver.resolve("abc123").expect("literal");
        assert_eq!(credential.expose(), "abc123");
    }

    #[test]
    fn env_reference_reads_the_named_variable() {
        // PATH 在测试环境中总是存在。
        let expected = std::env::var("PATH").expect("PATH is set");
        let credential = EnvSecretResolver.resolve("env:PATH").expect("env reference");
        assert_eq!(credential.expose(), expected.trim());
    }

    #[test]
    fn unset_or_empty_references_fail() {
        assert_eq!(
            EnvSecretResolver.resolve("env:MRA_CONNECTOR_TEST_UNSET_VARIABLE"),
            Err(SecretError::Missing {
                reference: "env:MRA_CONNECTOR_TEST_UNSET_VARIABLE".into()
            })
        );
        assert_eq!(
            EnvSecretResolver.resolve("  "),
            Err(SecretError::Empty {
                reference: "  ".into()
            })
        );
    }
}
