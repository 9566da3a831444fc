// 结构模型 - 描述单个 Python 文件的公开接口（函数、类、导入）
// 每次解析产生一个新模型，构建完成后不再修改

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

pub mod extractor;

pub use extractor::extract;

/// 通配符导入（`from x import *`）在 `imported_names` 中的哨兵标记
pub const WILDCARD_IMPORT: &str = "*";

/// 一个可调用对象（函数或方法）的完整签名信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// 函数名
    pub name: String,
    /// 位置参数名，按声明顺序（包含 self/cls）
    pub parameters: Vec<String>,
    /// 参数名到默认值源码文本的映射（仅含有默认值的参数）
    pub defaults: HashMap<String, String>,
    /// `*args` 风格参数绑定的名称
    pub vararg: Option<String>,
    /// `**kwargs` 风格参数绑定的名称
    pub kwarg: Option<String>,
    /// 参数名到类型注解源码文本的映射（可能包含 vararg/kwarg 名）
    pub annotations: HashMap<String, String>,
    /// 返回类型注解的源码文本
    pub return_annotation: Option<String>,
    /// 装饰器表达式的源码文本，按声明顺序
    pub decorators: Vec<String>,
    /// 是否为方法
    pub is_method: bool,
    /// 所属类名（仅方法有）
    pub owning_class: Option<String>,
    /// 声明所在行（1 起始）
    pub line: usize,
}

impl FunctionSignature {
    /// 查询某个参数的类型注解；vararg/kwarg 的名字也可能出现在注解表中
    pub fn annotation_of(&self, param: &str) -> Option<&str> {
        self.annotations.get(param).map(|s| s.as_str())
    }

    /// 渲染签名文本：`name(p1: T1 = d1, p2, *args, **kwargs) -> R`
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.parameters.len() + 2);

        for param in &self.parameters {
            let mut rendered = param.clone();
            if let Some(annotation) = self.annotations.get(param) {
                rendered.push_str(&format!(": {}", annotation));
            }
            if let Some(default) = self.defaults.get(param) {
                rendered.push_str(&format!(" = {}", default));
            }
            parts.push(rendered);
        }

        if let Some(vararg) = &self.vararg {
            parts.push(format!("*{}", vararg));
        }
        if let Some(kwarg) = &self.kwarg {
            parts.push(format!("**{}", kwarg));
        }

        let mut signature = format!("{}({})", self.name, parts.join(", "));
        if let Some(ret) = &self.return_annotation {
            signature.push_str(&format!(" -> {}", ret));
        }
        signature
    }
}

/// 一个类的结构描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    /// 基类表达式的源码文本，按声明顺序
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub line: usize,
    /// 方法名到签名的映射；同名方法后声明者生效
    pub methods: BTreeMap<String, FunctionSignature>,
}

impl ClassDescriptor {
    /// 渲染类签名文本：`class Name(Base1, Base2)`
    pub fn format(&self) -> String {
        format!("class {}({})", self.name, self.bases.join(", "))
    }
}

/// 一条导入语句的描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDescriptor {
    /// `from X import ...` 中的模块路径；普通 `import x` 为空串
    pub module: String,
    /// 导入的名称列表；通配符导入记录为 [`WILDCARD_IMPORT`]
    pub imported_names: Vec<String>,
    /// 原名到别名的映射
    pub aliases: HashMap<String, String>,
    pub is_from_import: bool,
    pub line: usize,
}

/// 单个文件单个修订版本的结构模型。
/// 文件在某个修订中不存在时用空模型表示，不用 None，
/// 这样差异比较只需一条代码路径。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralModel {
    /// 模块级函数
    pub functions: BTreeMap<String, FunctionSignature>,
    /// 模块级类
    pub classes: BTreeMap<String, ClassDescriptor>,
    /// 导入名称到导入描述的映射
    pub imports: BTreeMap<String, ImportDescriptor>,
    /// 模块级变量名集合
    pub module_level_variable_names: BTreeSet<String>,
}

impl StructuralModel {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.classes.is_empty()
            && self.imports.is_empty()
            && self.module_level_variable_names.is_empty()
    }
}
