//! Prodata test utilities.
//!
//! Fixture builders producing the JSON bodies the API accepts, so
//! integration tests can seed reference tables and production records
//! through the real routes.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// A code that will not collide with other fixtures in the same database.
pub fn unique_code(prefix: &str) -> String {
    let id = Uuid::now_v7().simple().to_string();
    format!("{prefix}{}", &id[id.len() - 10..])
}

/// Create an occupation fixture.
pub fn test_occupation(codigo: &str, descricao: &str) -> TestOccupation {
    TestOccupation {
        codigo: codigo.to_string(),
        descricao: descricao.to_string(),
        ativo: true,
    }
}

/// Occupation (CBO) fixture.
#[derive(Debug, Clone)]
pub struct TestOccupation {
    pub codigo: String,
    pub descricao: String,
    pub ativo: bool,
}

impl TestOccupation {
    /// Mark as inactive.
    pub fn inactive(mut self) -> Self {
        self.ativo = false;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "codigo": self.codigo,
            "descricao": self.descricao,
            "ativo": self.ativo,
        })
    }
}

/// Create a provider fixture.
pub fn test_provider(codigo: &str, razao_social: &str) -> TestProvider {
    TestProvider {
        codigo: codigo.to_string(),
        razao_social: razao_social.to_string(),
        cnpj_cpf: None,
        tipo_pessoa: "juridica".to_string(),
        ativo: true,
    }
}

/// Provider (prestador) fixture.
#[derive(Debug, Clone)]
pub struct TestProvider {
    pub codigo: String,
    pub razao_social: String,
    pub cnpj_cpf: Option<String>,
    pub tipo_pessoa: String,
    pub ativo: bool,
}

impl TestProvider {
    /// Set the CNPJ/CPF.
    pub fn with_tax_id(mut self, tax_id: &str) -> Self {
        self.cnpj_cpf = Some(tax_id.to_string());
        self
    }

    /// Mark as an individual.
    pub fn individual(mut self) -> Self {
        self.tipo_pessoa = "fisica".to_string();
        self
    }

    /// Mark as inactive.
    pub fn inactive(mut self) -> Self {
        self.ativo = false;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "codigo": self.codigo,
            "razaoSocial": self.razao_social,
            "cnpjCpf": self.cnpj_cpf,
            "tipoPessoa": self.tipo_pessoa,
            "ativo": self.ativo,
        })
    }
}

/// Create a procedure fixture.
pub fn test_procedure(codigo: &str, descricao: &str) -> TestProcedure {
    TestProcedure {
        codigo: codigo.to_string(),
        descricao: descricao.to_string(),
        valor: "0.00".to_string(),
        complexidade: "baixa".to_string(),
    }
}

/// Procedure (procedimento) fixture.
#[derive(Debug, Clone)]
pub struct TestProcedure {
    pub codigo: String,
    pub descricao: String,
    pub valor: String,
    pub complexidade: String,
}

impl TestProcedure {
    /// Set the reference value, as a decimal string.
    pub fn with_value(mut self, valor: &str) -> Self {
        self.valor = valor.to_string();
        self
    }

    /// Set the complexity tier.
    pub fn with_complexity(mut self, complexidade: &str) -> Self {
        self.complexidade = complexidade.to_string();
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "codigo": self.codigo,
            "descricao": self.descricao,
            "valor": self.valor,
            "complexidade": self.complexidade,
        })
    }
}

/// Create a financing source fixture.
pub fn test_financing_source(codigo: &str, descricao: &str) -> TestFinancingSource {
    TestFinancingSource {
        codigo: codigo.to_string(),
        descricao: descricao.to_string(),
        tipo_financiamento: None,
    }
}

/// Financing source (srub) fixture.
#[derive(Debug, Clone)]
pub struct TestFinancingSource {
    pub codigo: String,
    pub descricao: String,
    pub tipo_financiamento: Option<String>,
}

impl TestFinancingSource {
    pub fn with_type(mut self, tipo: &str) -> Self {
        self.tipo_financiamento = Some(tipo.to_string());
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "codigo": self.codigo,
            "descricao": self.descricao,
            "tipoFinanciamento": self.tipo_financiamento,
        })
    }
}

/// Create a production record fixture for a competence (`YYYY-MM-DD`).
pub fn test_production(competence: &str) -> TestProduction {
    TestProduction {
        prd_cmp: competence.to_string(),
        prd_dtr: None,
        prd_qtd: 1,
        prd_vl_p: "0.00".to_string(),
        prd_cid: None,
        cbo_id: None,
        prestador_id: None,
        procedimento_id: None,
        srub_id: None,
    }
}

/// Production record (producao) fixture.
#[derive(Debug, Clone)]
pub struct TestProduction {
    pub prd_cmp: String,
    pub prd_dtr: Option<String>,
    pub prd_qtd: i32,
    pub prd_vl_p: String,
    pub prd_cid: Option<String>,
    pub cbo_id: Option<Uuid>,
    pub prestador_id: Option<Uuid>,
    pub procedimento_id: Option<Uuid>,
    pub srub_id: Option<Uuid>,
}

impl TestProduction {
    /// Set quantity and value.
    pub fn with_amount(mut self, quantity: i32, value: &str) -> Self {
        self.prd_qtd = quantity;
        self.prd_vl_p = value.to_string();
        self
    }

    /// Set the diagnosis (CID) code.
    pub fn with_diagnosis(mut self, code: &str) -> Self {
        self.prd_cid = Some(code.to_string());
        self
    }

    /// Set the date the procedure was performed.
    pub fn realized_on(mut self, date: &str) -> Self {
        self.prd_dtr = Some(date.to_string());
        self
    }

    pub fn with_occupation(mut self, id: Uuid) -> Self {
        self.cbo_id = Some(id);
        self
    }

    pub fn with_provider(mut self, id: Uuid) -> Self {
        self.prestador_id = Some(id);
        self
    }

    pub fn with_procedure(mut self, id: Uuid) -> Self {
        self.procedimento_id = Some(id);
        self
    }

    pub fn with_financing_source(mut self, id: Uuid) -> Self {
        self.srub_id = Some(id);
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "prdCmp": self.prd_cmp,
            "prdDtr": self.prd_dtr,
            "prdQtd": self.prd_qtd,
            "prdVlP": self.prd_vl_p,
            "prdCid": self.prd_cid,
            "cboId": self.cbo_id,
            "prestadorId": self.prestador_id,
            "procedimentoId": self.procedimento_id,
            "srubId": self.srub_id,
        })
    }
}

/// Create an operator account fixture.
pub fn test_account(username: &str) -> TestAccount {
    TestAccount {
        username: username.to_string(),
        password: "test-password-123".to_string(),
        email: format!("{username}@example.org"),
        name: username.to_string(),
        role: "operador".to_string(),
    }
}

/// Account fixture.
#[derive(Debug, Clone)]
pub struct TestAccount {
    pub username: String,
    pub password: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl TestAccount {
    /// Give the account the administrator role.
    pub fn admin(mut self) -> Self {
        self.role = "admin".to_string();
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "username": self.username,
            "password": self.password,
            "email": self.email,
            "name": self.name,
            "role": self.role,
        })
    }
}
